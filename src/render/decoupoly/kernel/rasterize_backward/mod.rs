//! Backward tile rasterization, producing parameter gradients.
//!
//! Each tile replays its forward work with the same rays, sample
//! ordering, and early termination, then walks the composited samples
//! back to front to unroll the compositing chain. The parameter gradient
//! buffer is the only resource written by concurrent tiles; every write
//! to it is an atomic f32 accumulate over bit-cast `u32` storage.

pub use super::*;
pub use bytemuck::{Pod, Zeroable};
pub use rasterize::{Arguments, TRANSMITTANCE_MIN};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Clone, Copy, Debug)]
pub struct Inputs<'i> {
    pub octree: &'i Octree,
    /// `[L, R * 3 + R * K + C]`
    pub params: &'i [f32],
    /// `[I_y, I_x]`
    pub rays: &'i [Ray],
    /// `[I_y, I_x, C]`
    pub colors_2d_grad: &'i [f32],
    /// `[I_y, I_x]`
    pub depths_2d_grad: &'i [f32],
    pub gradient_merge: GradientMergeStrategy,
}

#[derive(Clone, Debug)]
pub struct Outputs {
    /// `[L, R * 3 + R * K + C]`
    pub params_grad: Vec<f32>,
}

/// One composited sample of the replayed forward pass.
#[derive(Clone, Copy, Debug)]
struct SampleState {
    leaf_index: u32,
    /// Ray parameter.
    t: f32,
    position: [f32; 3],
    /// Implicit value.
    value: f32,
    alpha: f32,
    /// Transmittance ahead of this sample.
    transmittance: f32,
}

/// Tile-local partial gradients, flushed once per touched leaf.
struct TileGradients {
    /// `[L_t]`
    leaves: Vec<u32>,
    /// `[L_t, R * 3 + R * K + C]`
    records: Vec<[f32; LEAF_RECORD_SIZE]>,
}

impl TileGradients {
    fn new() -> Self {
        Self {
            leaves: Vec::new(),
            records: Vec::new(),
        }
    }

    fn record_mut(
        &mut self,
        leaf_index: u32,
    ) -> &mut [f32; LEAF_RECORD_SIZE] {
        let index = self
            .leaves
            .iter()
            .position(|&leaf| leaf == leaf_index)
            .unwrap_or_else(|| {
                self.leaves.push(leaf_index);
                self.records.push([0.0; LEAF_RECORD_SIZE]);
                self.leaves.len() - 1
            });
        &mut self.records[index]
    }

    /// One synchronized merge per touched leaf.
    fn flush(
        &self,
        params_grad: &[AtomicU32],
    ) {
        for (index, &leaf_index) in self.leaves.iter().enumerate() {
            let offset = leaf_index as usize * LEAF_RECORD_SIZE;
            for (element, &value) in self.records[index].iter().enumerate() {
                accumulate(&params_grad[offset + element], value);
            }
        }
    }
}

/// Rasterizing the image gradients back to the scene parameters.
pub fn main(
    arguments: Arguments,
    inputs: Inputs,
) -> Outputs {
    // I_y * I_x
    let pixel_count =
        (arguments.image_size_y * arguments.image_size_x) as usize;
    // (I_y / T_y) * (I_x / T_x)
    let tile_count =
        (arguments.tile_count_y * arguments.tile_count_x) as usize;

    debug_assert_eq!(inputs.rays.len(), pixel_count);
    debug_assert_eq!(inputs.colors_2d_grad.len(), pixel_count * CHANNEL_COUNT);
    debug_assert_eq!(inputs.depths_2d_grad.len(), pixel_count);

    // [L, R * 3 + R * K + C]
    let params_grad = (0..inputs.params.len())
        .map(|_| AtomicU32::new(0.0f32.to_bits()))
        .collect::<Vec<_>>();

    (0..tile_count).into_par_iter().for_each(|tile_index| {
        let mut prefetcher = Prefetcher::new(inputs.params);
        let mut hits = Vec::with_capacity(arguments.sample_count as usize);
        let mut states = Vec::with_capacity(arguments.sample_count as usize);
        let mut tile_gradients = TileGradients::new();
        let mut sample_grad = [0.0f32; LEAF_RECORD_SIZE];

        rasterize::for_each_tile_pixel(&arguments, tile_index, |pixel_index| {
            backward_pixel(
                &arguments,
                &inputs,
                &mut prefetcher,
                &mut hits,
                &mut states,
                &mut tile_gradients,
                &mut sample_grad,
                &params_grad,
                pixel_index,
            );
        });

        if inputs.gradient_merge == GradientMergeStrategy::LocalToGlobal {
            tile_gradients.flush(&params_grad);
        }
    });

    Outputs {
        params_grad: params_grad
            .into_iter()
            .map(|bits| f32::from_bits(bits.into_inner()))
            .collect(),
    }
}

/// Replays one pixel and distributes its upstream gradient.
#[allow(clippy::too_many_arguments)]
fn backward_pixel(
    arguments: &Arguments,
    inputs: &Inputs,
    prefetcher: &mut Prefetcher,
    hits: &mut Vec<traverse::SampleHit>,
    states: &mut Vec<SampleState>,
    tile_gradients: &mut TileGradients,
    sample_grad: &mut [f32; LEAF_RECORD_SIZE],
    params_grad: &[AtomicU32],
    pixel_index: usize,
) {
    // [C]
    let color_grad =
        &inputs.colors_2d_grad[pixel_index * CHANNEL_COUNT..][..CHANNEL_COUNT];
    let depth_grad = inputs.depths_2d_grad[pixel_index];

    // Replaying the forward compositing deterministically.

    states.clear();
    traverse::sample_hits(
        inputs.octree,
        &inputs.rays[pixel_index],
        arguments.sample_count,
        hits,
    );
    for hit in hits.iter() {
        prefetcher.stage(hit.leaf_index);
    }

    let mut transmittance = 1.0f32;
    for hit in hits.iter() {
        let slot = prefetcher.stage(hit.leaf_index);
        let (value, _) = evaluate::evaluate(prefetcher.record(slot), hit.position);
        if !value.is_finite() {
            continue;
        }

        let alpha = evaluate::opacity(value);
        states.push(SampleState {
            leaf_index: hit.leaf_index,
            t: hit.t,
            position: hit.position,
            value,
            alpha,
            transmittance,
        });

        transmittance *= 1.0 - alpha;
        if transmittance < arguments.transmittance_min {
            break;
        }
    }

    // Unrolling the compositing chain back to front.
    //
    // With w_i <- T_i * alpha_i and u_i the sample's upstream gradient
    // through color and depth:
    //
    // d loss / d alpha_i <-
    //     T_i * u_i - sum_{j > i} (w_j * u_j) / (1 - alpha_i)

    let mut suffix = 0.0f32;
    for state in states.iter().rev() {
        let slot = prefetcher.stage(state.leaf_index);
        let record = prefetcher.record(slot);
        let appearance = &record[DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE..];

        let mut upstream = state.t * depth_grad;
        for channel in 0..CHANNEL_COUNT {
            upstream += appearance[channel] * color_grad[channel];
        }

        let weight = state.transmittance * state.alpha;
        let alpha_grad = state.transmittance * upstream
            - suffix / (1.0 - state.alpha);
        suffix += weight * upstream;

        let value_grad =
            alpha_grad * evaluate::opacity_value_derivative(state.value);

        sample_grad.fill(0.0);
        evaluate::evaluate_record_grad(
            record,
            state.position,
            value_grad,
            sample_grad,
        );
        let appearance_offset = DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE;
        for channel in 0..CHANNEL_COUNT {
            sample_grad[appearance_offset + channel] =
                weight * color_grad[channel];
        }

        match inputs.gradient_merge {
            GradientMergeStrategy::LocalToGlobal => {
                let record_grad = tile_gradients.record_mut(state.leaf_index);
                for (element, &value) in sample_grad.iter().enumerate() {
                    record_grad[element] += value;
                }
            },
            GradientMergeStrategy::Global => {
                let offset = state.leaf_index as usize * LEAF_RECORD_SIZE;
                for (element, &value) in sample_grad.iter().enumerate() {
                    accumulate(&params_grad[offset + element], value);
                }
            },
            GradientMergeStrategy::None => {},
        }
    }
}

/// Atomic f32 accumulate over bit-cast `u32` storage, never a plain
/// overwrite.
fn accumulate(
    target: &AtomicU32,
    value: f32,
) {
    if value == 0.0 {
        return;
    }

    let mut current = target.load(Ordering::Relaxed);
    loop {
        let next = (f32::from_bits(current) + value).to_bits();
        match target.compare_exchange_weak(
            current,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}
