pub mod evaluate;
pub mod prefetch;
pub mod rasterize;
pub mod rasterize_backward;
pub mod traverse;

pub use super::*;
pub use prefetch::Prefetcher;
pub use traverse::SampleHit;
