pub use super::*;

/// The forward state a backward pass replays from.
#[derive(Clone, Debug)]
pub struct RenderInput {
    /// `[I_y, I_x]`
    pub rays: Vec<Ray>,
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `S`
    pub sample_count: u32,
    /// `T_min`
    pub transmittance_min: f32,
    pub gradient_merge: GradientMergeStrategy,
}

#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// `[L, R * 3 + R * K + C]`
    pub params_grad: Vec<f32>,
}
