pub use super::*;

#[derive(Clone, Copy, Debug)]
pub struct RenderInput<'i> {
    pub octree: &'i Octree,
    /// `[L, R * 3 + R * K + C]`
    pub params: &'i [f32],
}

#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// `[I_y, I_x, C]`
    pub colors_2d: Vec<f32>,
    /// `[I_y, I_x]`
    pub depths_2d: Vec<f32>,
    /// `[I_y, I_x]`
    pub sample_rendered_counts: Vec<u32>,
    /// `[I_y, I_x]`
    pub transmittances: Vec<f32>,
    pub state: backward::RenderInput,
}
