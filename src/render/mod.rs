pub mod decoupoly;
pub mod view;
