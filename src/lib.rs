#![allow(missing_docs)]

pub mod error;
pub mod preset;
pub mod render;
pub mod scene;
