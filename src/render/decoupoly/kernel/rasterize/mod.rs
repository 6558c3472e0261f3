//! Forward tile rasterization of an octree decoupoly scene.

pub use super::*;
pub use bytemuck::{Pod, Zeroable};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// `T_min`
///
/// Transmittance threshold of early termination. Stopping below it only
/// drops contributions within floating-point tolerance of zero.
pub const TRANSMITTANCE_MIN: f32 = 1e-4;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Arguments {
    /// `I_x`
    pub image_size_x: u32,
    /// `I_y`
    pub image_size_y: u32,
    /// `I_x / T_x`
    pub tile_count_x: u32,
    /// `I_y / T_y`
    pub tile_count_y: u32,
    /// `S`
    pub sample_count: u32,
    /// `T_min`
    pub transmittance_min: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Inputs<'i> {
    pub octree: &'i Octree,
    /// `[L, R * 3 + R * K + C]`
    pub params: &'i [f32],
    /// `[I_y, I_x]`
    pub rays: &'i [Ray],
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[I_y, I_x, C]`
    pub colors_2d: Vec<f32>,
    /// `[I_y, I_x]`
    pub depths_2d: Vec<f32>,
    /// `[I_y, I_x]`
    pub sample_rendered_counts: Vec<u32>,
    /// `[I_y, I_x]`
    pub transmittances: Vec<f32>,
}

/// The composited result of one pixel.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PixelForward {
    /// `[C]`
    pub color: [f32; CHANNEL_COUNT],
    pub depth: f32,
    /// Composited sample count.
    pub sample_rendered_count: u32,
    /// Remaining transmittance.
    pub transmittance: f32,
    /// Samples dropped for non-finite implicit values.
    pub nonfinite_count: u32,
}

/// One tile's pixel results, kept in the tile workspace until the
/// scatter into the image buffers.
struct TileForward {
    tile_index: usize,
    /// `[T_y * T_x]`
    pixels: Vec<PixelForward>,
}

/// Rasterizing the octree decoupoly scene to the image.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // I_x
    let image_size_x = arguments.image_size_x as usize;
    // I_y
    let image_size_y = arguments.image_size_y as usize;
    // I_y * I_x
    let pixel_count = image_size_y * image_size_x;
    // (I_y / T_y) * (I_x / T_x)
    let tile_count =
        (arguments.tile_count_y * arguments.tile_count_x) as usize;

    debug_assert_eq!(inputs.rays.len(), pixel_count);
    debug_assert_ne!(arguments.sample_count, 0);

    // Tiles are independent. Each one owns its workspace for its
    // lifetime and is scattered into the image buffers afterward.
    let tiles = (0..tile_count)
        .into_par_iter()
        .map(|tile_index| {
            let mut pixels = Vec::with_capacity(
                (TILE_SIZE_Y * TILE_SIZE_X) as usize,
            );
            let mut prefetcher = Prefetcher::new(inputs.params);
            let mut hits = Vec::with_capacity(arguments.sample_count as usize);

            for_each_tile_pixel(&arguments, tile_index, |pixel_index| {
                pixels.push(render_pixel(
                    &arguments,
                    &inputs,
                    &mut prefetcher,
                    &mut hits,
                    pixel_index,
                ));
            });

            TileForward { tile_index, pixels }
        })
        .collect::<Vec<_>>();

    // [I_y, I_x, C]
    let mut colors_2d = vec![0.0; pixel_count * CHANNEL_COUNT];
    // [I_y, I_x]
    let mut depths_2d = vec![0.0; pixel_count];
    // [I_y, I_x]
    let mut sample_rendered_counts = vec![0; pixel_count];
    // [I_y, I_x]
    let mut transmittances = vec![1.0; pixel_count];

    let mut nonfinite_count = 0u64;
    for tile in tiles {
        let mut pixels = tile.pixels.iter();
        for_each_tile_pixel(&arguments, tile.tile_index, |pixel_index| {
            let pixel = pixels.next().expect("One result per tile pixel");
            colors_2d[pixel_index * CHANNEL_COUNT..][..CHANNEL_COUNT]
                .copy_from_slice(&pixel.color);
            depths_2d[pixel_index] = pixel.depth;
            sample_rendered_counts[pixel_index] =
                pixel.sample_rendered_count;
            transmittances[pixel_index] = pixel.transmittance;
            nonfinite_count += pixel.nonfinite_count as u64;
        });
    }

    if nonfinite_count > 0 {
        log::warn!(
            target: "decoupoly::renderer::forward",
            "{nonfinite_count} samples dropped for non-finite implicit values",
        );
    }

    Outputs {
        colors_2d,
        depths_2d,
        sample_rendered_counts,
        transmittances,
    }
}

/// Composites one pixel front to back.
pub(crate) fn render_pixel(
    arguments: &Arguments,
    inputs: &Inputs,
    prefetcher: &mut Prefetcher,
    hits: &mut Vec<traverse::SampleHit>,
    pixel_index: usize,
) -> PixelForward {
    let mut pixel = PixelForward {
        transmittance: 1.0,
        ..Default::default()
    };

    traverse::sample_hits(
        inputs.octree,
        &inputs.rays[pixel_index],
        arguments.sample_count,
        hits,
    );

    // Staging the whole batch ahead of evaluation.
    for hit in hits.iter() {
        prefetcher.stage(hit.leaf_index);
    }

    for hit in hits.iter() {
        let slot = prefetcher.stage(hit.leaf_index);
        let record = prefetcher.record(slot);

        let (value, _) = evaluate::evaluate(record, hit.position);
        if !value.is_finite() {
            pixel.nonfinite_count += 1;
            continue;
        }

        let alpha = evaluate::opacity(value);
        let weight = pixel.transmittance * alpha;

        let appearance = &record[DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE..];
        for channel in 0..CHANNEL_COUNT {
            pixel.color[channel] += weight * appearance[channel];
        }
        pixel.depth += weight * hit.t;

        pixel.transmittance *= 1.0 - alpha;
        pixel.sample_rendered_count += 1;

        if pixel.transmittance < arguments.transmittance_min {
            break;
        }
    }

    pixel
}

/// Visits the flat pixel indices of one tile in row-major order,
/// skipping the cut-off parts of edge tiles.
pub(crate) fn for_each_tile_pixel(
    arguments: &Arguments,
    tile_index: usize,
    mut visit: impl FnMut(usize),
) {
    let tile_x = tile_index % arguments.tile_count_x as usize;
    let tile_y = tile_index / arguments.tile_count_x as usize;

    let pixel_x_min = tile_x * TILE_SIZE_X as usize;
    let pixel_y_min = tile_y * TILE_SIZE_Y as usize;
    let pixel_x_max = (pixel_x_min + TILE_SIZE_X as usize)
        .min(arguments.image_size_x as usize);
    let pixel_y_max = (pixel_y_min + TILE_SIZE_Y as usize)
        .min(arguments.image_size_y as usize);

    for pixel_y in pixel_y_min..pixel_y_max {
        for pixel_x in pixel_x_min..pixel_x_max {
            visit(pixel_y * arguments.image_size_x as usize + pixel_x);
        }
    }
}
