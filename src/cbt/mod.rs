//! Concurrent binary tree: a packed bitfield heap with an embedded
//! sum-reduction tree, supporting O(log N) rank-to-leaf decoding

pub mod heap;
pub mod node;
pub mod reduction;

pub use heap::{Cbt, CbtConfig, MAX_SUPPORTED_DEPTH};
pub use node::Node;
