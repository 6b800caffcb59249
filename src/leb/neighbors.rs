//! Same-depth neighborhood arithmetic
//!
//! For a triangle with corners `(a, b, c)` (hypotenuse `a`-`c`), its
//! same-depth neighbors are: `left` across edge `b`-`c`, `right` across
//! edge `a`-`b`, and `edge` across the hypotenuse. The quadruple is
//! rebuilt from scratch per query by replaying the node's path bits
//! through the split rule, so it needs no storage and no heap access.
//!
//! The hypotenuse neighbor is what both the conforming-split cascade and
//! the diamond-merge eligibility test are built on, and the rule must
//! respect the alternating split orientation across depth parity; the
//! replay below does so because the two path-bit cases are mirrored.

use super::Domain;
use crate::cbt::Node;

/// Same-depth neighbor indices of a node; 0 marks a domain border
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SameDepthNeighbors {
    pub left: u32,
    pub right: u32,
    pub edge: u32,
    pub node: u32,
}

/// Neighbor indices of a child, given its parent's neighbor indices and
/// the path bit selecting the child
fn split_neighbors(n: SameDepthNeighbors, bit: u32) -> SameDepthNeighbors {
    let b2 = (n.right != 0) as u32;
    let b3 = (n.edge != 0) as u32;
    if bit == 0 {
        SameDepthNeighbors {
            left: n.node << 1 | 1,
            right: n.edge << 1 | b3,
            edge: n.right << 1 | b2,
            node: n.node << 1,
        }
    } else {
        SameDepthNeighbors {
            left: n.edge << 1,
            right: n.node << 1,
            edge: n.left << 1,
            node: n.node << 1 | 1,
        }
    }
}

/// Compute a node's same-depth neighborhood by replaying its path
pub fn same_depth_neighbors(node: Node, domain: Domain) -> SameDepthNeighbors {
    let (mut ids, first_level) = match domain {
        Domain::Triangle => (
            SameDepthNeighbors { left: 0, right: 0, edge: 0, node: 1 },
            0,
        ),
        Domain::Square => {
            if node.depth == 0 {
                return SameDepthNeighbors { left: 0, right: 0, edge: 0, node: 1 };
            }
            // the first path bit picks one of the two base triangles,
            // which share their hypotenuse along the square's diagonal
            let b = node.path_bit(0);
            (
                SameDepthNeighbors { left: 0, right: 0, edge: 3 - b, node: 2 + b },
                1,
            )
        }
    };
    for level in first_level..node.depth {
        ids = split_neighbors(ids, node.path_bit(level));
    }
    ids
}

/// The same-depth neighbor across the hypotenuse, if any
pub fn edge_neighbor(node: Node, domain: Domain) -> Option<Node> {
    let edge = same_depth_neighbors(node, domain).edge;
    (edge != 0).then(|| Node::new(edge, node.depth))
}

/// The two parents whose children tile a diamond around the vertex a
/// merge would remove
///
/// `base` is the node's own parent; `top` is the parent's hypotenuse
/// neighbor, or `base` again when the hypotenuse lies on the border.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diamond {
    pub base: Node,
    pub top: Node,
}

pub fn diamond_parent(node: Node, domain: Domain) -> Diamond {
    debug_assert!(!node.is_root());
    let base = node.parent();
    let top = edge_neighbor(base, domain).unwrap_or(base);
    Diamond { base, top }
}
