//! Structural presets of the octree decoupoly renderer.
//!
//! They are fixed at compile time. The tile and buffer sizes bound the
//! per-tile working set, so the workspace capacity checks in
//! [`crate::render::decoupoly`] hold by construction.

/// `T_x`
pub const TILE_SIZE_X: u32 = 8;
/// `T_y`
pub const TILE_SIZE_Y: u32 = 8;
/// `C`
pub const CHANNEL_COUNT: usize = 3;
/// `D_max`
pub const TREE_DEPTH_MAX: u32 = 10;
/// `N_f`
pub const PREFETCH_BUFFER_SIZE: usize = 8;
/// `S`
pub const SAMPLE_COUNT: u32 = 8;
/// `K`
pub const DECOUPOLY_DEGREE: usize = 8;
/// `R`
pub const DECOUPOLY_RANK: usize = 16;
/// `R * 3`
pub const DECOUPOLY_V_SIZE: usize = DECOUPOLY_RANK * 3;
/// `R * K`
pub const DECOUPOLY_G_SIZE: usize = DECOUPOLY_RANK * DECOUPOLY_DEGREE;
/// `R * 3 + R * K + C`
pub const LEAF_RECORD_SIZE: usize =
    DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE + CHANNEL_COUNT;
