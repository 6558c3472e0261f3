//! Staging of leaf parameter records into tile-owned scratch.
//!
//! The rasterizer stages the records of a pixel's whole sample batch
//! ahead of evaluating any of them, round-robin over a small ring of
//! fixed slots. Staging is a pure latency-hiding layer: a staged record
//! is always identical to a synchronous fetch from the bulk buffer.

pub use super::*;

/// Sentinel of an unoccupied slot.
pub const LEAF_NONE: u32 = u32::MAX;

/// A bounded ring of staged leaf records.
///
/// The capacity is [`PREFETCH_BUFFER_SIZE`] slots. The rasterizer keeps
/// its in-flight working set within capacity by construction; the
/// precondition is checked before the pass starts.
#[derive(Clone, Debug)]
pub struct Prefetcher<'p> {
    /// `[L, R * 3 + R * K + C]`
    params: &'p [f32],
    /// `[N_f, R * 3 + R * K + C]`
    slots: [[f32; LEAF_RECORD_SIZE]; PREFETCH_BUFFER_SIZE],
    /// `[N_f]`
    staged: [u32; PREFETCH_BUFFER_SIZE],
    cursor: usize,
}

impl<'p> Prefetcher<'p> {
    pub fn new(params: &'p [f32]) -> Self {
        Self {
            params,
            slots: [[0.0; LEAF_RECORD_SIZE]; PREFETCH_BUFFER_SIZE],
            staged: [LEAF_NONE; PREFETCH_BUFFER_SIZE],
            cursor: 0,
        }
    }

    /// Stages the leaf's record and returns its slot.
    ///
    /// A record already resident is reused; otherwise the oldest slot is
    /// overwritten.
    pub fn stage(
        &mut self,
        leaf_index: u32,
    ) -> usize {
        if let Some(slot) =
            self.staged.iter().position(|&staged| staged == leaf_index)
        {
            return slot;
        }

        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % PREFETCH_BUFFER_SIZE;

        let offset = leaf_index as usize * LEAF_RECORD_SIZE;
        self.slots[slot]
            .copy_from_slice(&self.params[offset..offset + LEAF_RECORD_SIZE]);
        self.staged[slot] = leaf_index;

        slot
    }

    /// The staged record at `slot`.
    #[inline]
    pub fn record(
        &self,
        slot: usize,
    ) -> &[f32; LEAF_RECORD_SIZE] {
        &self.slots[slot]
    }
}
