//! Lebtri - concurrent binary trees for longest-edge bisection

pub mod core;
pub mod cbt;
pub mod leb;
pub mod mesh;
