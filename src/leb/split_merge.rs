//! Split and merge mutations
//!
//! Both operations flip leaf bits only; partial sums are left stale and
//! the caller owns the follow-up reduction. Touched bitfield slots are
//! appended to the caller's list so a batch of mutations can choose
//! between per-slot path reduction and one full reduction.
//!
//! Merging is the guarded direction: it only proceeds when the diamond
//! around the vertex it would remove is fully collapsed, so a merge can
//! never open a crack. Splitting a single pair can transiently leave a
//! T-junction on the bisected edge until the neighbor across it splits
//! too; [`split_node_conforming`] performs that neighbor cascade eagerly
//! when transient cracks are unacceptable.

use super::{neighbors, Domain};
use crate::cbt::{Cbt, Node};
use crate::core::error::Error;
use crate::core::types::Result;

/// Set `node`'s split bit: the leaf bit of its right child
///
/// The left child inherits the node's own bit, so this single flip turns
/// `node` from a leaf into an internal node with two leaf children. A
/// no-op when the right child's subtree is already populated, which is
/// what makes the conforming cascade idempotent.
///
/// Records two slots per flip: the flipped bit (the right child's, for
/// reduction) and the node's own bit (whose leaf status just changed).
fn split_bit(cbt: &mut Cbt, node: Node, touched: &mut Vec<u64>) {
    if let Some(slot) = cbt.set_leaf_bit(node.right_child(), true) {
        touched.push(slot);
        touched.push(cbt.bitfield_slot(node));
    }
}

/// Bisect `node`'s hypotenuse, replacing the leaf with its two children
///
/// Precondition: `node` is an active leaf. Fails with
/// [`Error::DepthLimitExceeded`] at the maximum depth, leaving the heap
/// untouched.
pub fn split_node(cbt: &mut Cbt, node: Node, touched: &mut Vec<u64>) -> Result<()> {
    if cbt.is_ceil(node) {
        return Err(Error::DepthLimitExceeded(node));
    }
    debug_assert!(cbt.is_leaf(node), "split target {node:?} is not a leaf");
    split_bit(cbt, node, touched);
    Ok(())
}

/// Split `node` and cascade across hypotenuses until no T-junction
/// remains
///
/// Bisecting a hypotenuse inserts a midpoint vertex on the neighbor
/// across it; the cascade splits that neighbor (and, transitively, the
/// neighbor of its parent) so every inserted vertex is shared. Each step
/// climbs one level, so the walk terminates at a border or at the base
/// of the domain.
pub fn split_node_conforming(
    cbt: &mut Cbt,
    node: Node,
    domain: Domain,
    touched: &mut Vec<u64>,
) -> Result<()> {
    if cbt.is_ceil(node) {
        return Err(Error::DepthLimitExceeded(node));
    }

    split_bit(cbt, node, touched);
    let mut iterator = neighbors::edge_neighbor(node, domain);
    while let Some(neighbor) = iterator {
        if neighbor.is_root() {
            break;
        }
        split_bit(cbt, neighbor, touched);
        let parent = neighbor.parent();
        split_bit(cbt, parent, touched);
        iterator = neighbors::edge_neighbor(parent, domain);
    }
    Ok(())
}

/// Merge `node` and its sibling back into their parent, if conforming
///
/// Legal only when the diamond around the vertex the merge removes is
/// fully collapsed: both diamond parents must hold at most two leaves.
/// Anything deeper means the partner across the bisected edge is still
/// subdivided and the merge would open a crack, so it fails with
/// [`Error::MergeNotEligible`] and the heap is untouched. Eligibility is
/// read from the current sums, so within a batched pass it reflects the
/// pre-pass snapshot.
pub fn merge_node(cbt: &mut Cbt, node: Node, domain: Domain, touched: &mut Vec<u64>) -> Result<()> {
    if node.is_root() {
        return Err(Error::MergeNotEligible(node));
    }

    let diamond = neighbors::diamond_parent(node, domain);
    if cbt.heap_read(diamond.base) > 2 || cbt.heap_read(diamond.top) > 2 {
        return Err(Error::MergeNotEligible(node));
    }

    // clearing the right sibling's bit moves the pair's leaf status up
    // to the parent; idempotent for whichever sibling merges second
    if let Some(slot) = cbt.set_leaf_bit(node.right_sibling(), false) {
        touched.push(slot);
        touched.push(cbt.bitfield_slot(node.left_sibling()));
    }
    Ok(())
}
