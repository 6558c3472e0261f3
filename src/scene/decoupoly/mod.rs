pub mod config;
pub mod property;

pub use crate::{
    error::Error,
    preset::*,
    scene::octree::Octree,
};
pub use config::*;

use humansize::{format_size, BINARY};
use std::fmt;

/// A renderable octree decoupoly scene.
///
/// The octree partitions the root volume; each leaf owns one contiguous
/// parameter record of [`LEAF_RECORD_SIZE`] scalars: `R` basis vectors of
/// 3 scalars, `R * K` polynomial coefficients, and `C` appearance
/// channels. Both buffers are read-only for the duration of a
/// forward + backward pass.
#[derive(Clone, PartialEq)]
pub struct DecoupolyScene {
    pub octree: Octree,
    /// `[L, R * 3 + R * K + C]`
    pub(crate) params: Vec<f32>,
}

impl fmt::Debug for DecoupolyScene {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("DecoupolyScene")
            .field("octree.nodes.len()", &self.octree.nodes.len())
            .field("leaf_count", &self.leaf_count())
            .field("params.size()", &format_size(self.size(), BINARY))
            .finish()
    }
}

impl Default for DecoupolyScene {
    fn default() -> Self {
        DecoupolySceneConfig::default().into()
    }
}
