//! Longest-edge bisection layer
//!
//! Interprets each active leaf of the [`Cbt`](crate::cbt::Cbt) as a
//! triangle reached from the base domain by bisecting the longest edge
//! once per path bit, and provides the split/merge mutations, with
//! merges gated by the diamond rule that keeps the triangulation
//! crack-free.

pub mod attributes;
pub mod neighbors;
pub mod split_merge;

pub use attributes::{decode_triangle, Triangle};
pub use neighbors::{
    diamond_parent, edge_neighbor, same_depth_neighbors, Diamond, SameDepthNeighbors,
};
pub use split_merge::{merge_node, split_node, split_node_conforming};

use serde::{Deserialize, Serialize};

/// Base domain covered by the subdivision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    /// A single right isosceles triangle
    Triangle,
    /// The unit square, glued from two such triangles along its diagonal;
    /// this is the heightmap layout
    Square,
}
