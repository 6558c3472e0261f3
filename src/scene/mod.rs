pub mod decoupoly;
pub mod octree;
