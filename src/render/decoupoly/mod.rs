pub mod backward;
pub mod forward;
pub mod kernel;

pub use crate::{
    error::Error,
    preset::*,
    render::view::{Ray, View},
    scene::{decoupoly::DecoupolyScene, octree::Octree},
};
pub use kernel::rasterize::TRANSMITTANCE_MIN;

/// How concurrent tiles merge their partial parameter gradients into the
/// global buffer.
///
/// The strategies are numerically equivalent within floating-point
/// tolerance; they trade contention for scratch usage. The choice is
/// made once at setup.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GradientMergeStrategy {
    /// Accumulate in tile-local scratch, one synchronized merge per
    /// touched leaf per tile. Minimal contention.
    #[default]
    LocalToGlobal,
    /// One synchronized accumulate per sample contribution.
    Global,
    /// Compute but never merge. For forward-replay inspection only.
    None,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecoupolyRendererOptions {
    pub gradient_merge: GradientMergeStrategy,
    /// `S`
    ///
    /// It should be no more than [`PREFETCH_BUFFER_SIZE`].
    pub sample_count: u32,
    /// `T_min`
    pub transmittance_min: f32,
}

impl Default for DecoupolyRendererOptions {
    #[inline]
    fn default() -> Self {
        Self {
            gradient_merge: Default::default(),
            sample_count: SAMPLE_COUNT,
            transmittance_min: TRANSMITTANCE_MIN,
        }
    }
}

/// Renders the scene for the view.
///
/// The returned state replays deterministically in
/// [`render_backward`].
pub fn render_forward(
    input: forward::RenderInput,
    view: &View,
    options: &DecoupolyRendererOptions,
) -> Result<forward::RenderOutput, Error> {
    log::debug!(target: "decoupoly::renderer::forward", "start");

    let arguments = check_pass(
        input.octree,
        input.params,
        view.image_width,
        view.image_height,
        options,
    )?;

    // [I_y, I_x]
    let rays = view.pixel_rays();

    log::debug!(target: "decoupoly::renderer::forward", "rasterize");

    let outputs = kernel::rasterize::main(
        arguments,
        kernel::rasterize::Inputs {
            octree: input.octree,
            params: input.params,
            rays: &rays,
        },
    );

    Ok(forward::RenderOutput {
        colors_2d: outputs.colors_2d,
        depths_2d: outputs.depths_2d,
        sample_rendered_counts: outputs.sample_rendered_counts,
        transmittances: outputs.transmittances,
        state: backward::RenderInput {
            rays,
            image_size_x: view.image_width,
            image_size_y: view.image_height,
            sample_count: arguments.sample_count,
            transmittance_min: arguments.transmittance_min,
            gradient_merge: options.gradient_merge,
        },
    })
}

/// Propagates the image-space gradients back to the scene parameters.
///
/// The octree and parameters should be the ones the forward pass ran
/// with; the state carries the rays, so the sample ordering reproduces
/// exactly.
pub fn render_backward(
    input: backward::RenderInput,
    octree: &Octree,
    params: &[f32],
    colors_2d_grad: &[f32],
    depths_2d_grad: &[f32],
) -> Result<backward::RenderOutput, Error> {
    log::debug!(target: "decoupoly::renderer::backward", "start");

    let arguments = check_pass(
        octree,
        params,
        input.image_size_x,
        input.image_size_y,
        &DecoupolyRendererOptions {
            gradient_merge: input.gradient_merge,
            sample_count: input.sample_count,
            transmittance_min: input.transmittance_min,
        },
    )?;

    // I_y * I_x
    let pixel_count = (input.image_size_y * input.image_size_x) as usize;
    if colors_2d_grad.len() != pixel_count * CHANNEL_COUNT {
        return Err(Error::Validation(
            format!("colors_2d_grad.len() {}", colors_2d_grad.len()),
            format!("{}", pixel_count * CHANNEL_COUNT),
        ));
    }
    if depths_2d_grad.len() != pixel_count {
        return Err(Error::Validation(
            format!("depths_2d_grad.len() {}", depths_2d_grad.len()),
            format!("{pixel_count}"),
        ));
    }

    log::debug!(target: "decoupoly::renderer::backward", "rasterize_backward");

    let outputs = kernel::rasterize_backward::main(
        arguments,
        kernel::rasterize_backward::Inputs {
            octree,
            params,
            rays: &input.rays,
            colors_2d_grad,
            depths_2d_grad,
            gradient_merge: input.gradient_merge,
        },
    );

    Ok(backward::RenderOutput {
        params_grad: outputs.params_grad,
    })
}

/// Checks the structural preconditions of a pass and derives the kernel
/// arguments.
///
/// Per-sample conditions (out-of-volume points, degenerate bases) are
/// absorbed inside the kernels; everything surfaced here aborts before
/// any tile runs.
fn check_pass(
    octree: &Octree,
    params: &[f32],
    image_size_x: u32,
    image_size_y: u32,
    options: &DecoupolyRendererOptions,
) -> Result<kernel::rasterize::Arguments, Error> {
    if image_size_x == 0 || image_size_y == 0 {
        return Err(Error::Validation(
            format!("image size {image_size_x}x{image_size_y}"),
            "nonzero".into(),
        ));
    }
    if options.sample_count == 0 {
        return Err(Error::Validation(
            "options.sample_count".into(),
            "nonzero".into(),
        ));
    }
    if options.sample_count as usize > PREFETCH_BUFFER_SIZE {
        return Err(Error::WorkspaceOverflow(
            format!("options.sample_count {}", options.sample_count),
            format!("{PREFETCH_BUFFER_SIZE}"),
        ));
    }
    if params.len() % LEAF_RECORD_SIZE != 0 {
        return Err(Error::Validation(
            format!("params.len() {}", params.len()),
            format!("a multiple of the record size {LEAF_RECORD_SIZE}"),
        ));
    }

    octree.validate(params.len() / LEAF_RECORD_SIZE)?;

    Ok(kernel::rasterize::Arguments {
        image_size_x,
        image_size_y,
        tile_count_x: image_size_x.div_ceil(TILE_SIZE_X),
        tile_count_y: image_size_y.div_ceil(TILE_SIZE_Y),
        sample_count: options.sample_count,
        transmittance_min: options.transmittance_min,
    })
}

impl DecoupolyScene {
    /// Renders the scene for the view.
    pub fn render(
        &self,
        view: &View,
        options: &DecoupolyRendererOptions,
    ) -> Result<forward::RenderOutput, Error> {
        render_forward(
            forward::RenderInput {
                octree: &self.octree,
                params: self.params(),
            },
            view,
            options,
        )
    }

    /// Propagates the image-space gradients back to the scene
    /// parameters.
    #[must_use = "The gradients should be used"]
    pub fn render_backward(
        &self,
        state: backward::RenderInput,
        colors_2d_grad: &[f32],
        depths_2d_grad: &[f32],
    ) -> Result<backward::RenderOutput, Error> {
        render_backward(
            state,
            &self.octree,
            self.params(),
            colors_2d_grad,
            depths_2d_grad,
        )
    }
}
