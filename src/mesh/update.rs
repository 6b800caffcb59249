//! Batched level-of-detail update pass
//!
//! One pass evaluates a caller-supplied decision function over every
//! leaf against a frozen snapshot of the tree, then applies the
//! requested mutations in rank order. Decisions run from the rayon pool
//! and never write; the serial apply phase skips any request whose leaf
//! status was changed by an earlier mutation in the same pass, so each
//! leaf mutates at most once and conflicting requests resolve by rank.
//!
//! Sums are restored once at the end of the pass, per touched slot or
//! via a full reduction when enough bits moved.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::cbt::Node;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::leb;

use super::{Leaf, Triangulation};

/// Per-leaf verdict of the level-of-detail decision function
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodDecision {
    /// Subdivide this leaf one level
    Split,
    /// Collapse this leaf and its sibling into their parent
    Merge,
    /// Leave this leaf as it is
    Keep,
}

/// Outcome counts of one update pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub splits: u64,
    pub merges: u64,
    /// Keep verdicts plus requests skipped after a conflicting mutation
    pub kept: u64,
    /// Splits at the depth limit and merges the diamond rule rejected
    pub refused: u64,
}

impl Triangulation {
    /// Run one level-of-detail pass over every active leaf
    ///
    /// `classify` sees leaves decoded from the pre-pass tree; it must be
    /// a pure function of the leaf since it runs in parallel. Refusals
    /// at the depth limit and by the merge eligibility rule are counted,
    /// not returned as errors.
    pub fn update_pass<F>(&mut self, classify: F) -> Result<UpdateStats>
    where
        F: Fn(&Leaf) -> LodDecision + Sync,
    {
        let this = &*self;
        let decisions: Vec<(Node, LodDecision)> = (0..this.leaf_count())
            .into_par_iter()
            .map(|rank| {
                let leaf = this.leaf(rank);
                (leaf.node, classify(&leaf))
            })
            .collect();

        let mut stats = UpdateStats::default();
        let mut touched: Vec<u64> = Vec::new();
        // slots whose leaf status already changed this pass
        let mut dirty: HashSet<u64> = HashSet::new();
        for (node, decision) in decisions {
            if dirty.contains(&self.cbt.bitfield_slot(node)) {
                stats.kept += 1;
                continue;
            }
            let before = touched.len();
            let outcome = match decision {
                LodDecision::Keep => {
                    stats.kept += 1;
                    continue;
                }
                LodDecision::Split => leb::split_node(&mut self.cbt, node, &mut touched),
                LodDecision::Merge => {
                    leb::merge_node(&mut self.cbt, node, self.domain, &mut touched)
                }
            };
            match outcome {
                Ok(()) => match decision {
                    LodDecision::Split => stats.splits += 1,
                    LodDecision::Merge => stats.merges += 1,
                    LodDecision::Keep => unreachable!(),
                },
                Err(Error::DepthLimitExceeded(_)) | Err(Error::MergeNotEligible(_)) => {
                    stats.refused += 1;
                }
                Err(other) => return Err(other),
            }
            dirty.extend(touched[before..].iter().copied());
        }

        self.reduce_touched(touched);
        log::debug!(
            "update pass: {} splits, {} merges, {} kept, {} refused, {} leaves",
            stats.splits,
            stats.merges,
            stats.kept,
            stats.refused,
            self.leaf_count()
        );

        #[cfg(debug_assertions)]
        self.cbt.validate()?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leb::Domain;
    use crate::mesh::TriangulationConfig;

    fn square(max_depth: u32, init_depth: u32) -> Triangulation {
        Triangulation::new(&TriangulationConfig {
            max_depth,
            init_depth,
            domain: Domain::Square,
        })
        .unwrap()
    }

    fn n(id: u32) -> Node {
        Node::from_id(id)
    }

    #[test]
    fn test_uniform_refinement_doubles_leaves() {
        let mut tri = square(4, 0);
        assert_eq!(tri.leaf_count(), 1);
        for expected in [2u64, 4, 8] {
            let stats = tri.update_pass(|_| LodDecision::Split).unwrap();
            assert_eq!(tri.leaf_count(), expected);
            assert_eq!(stats.splits, expected / 2);
            assert_eq!(stats.refused, 0);
        }
        tri.cbt().validate().unwrap();
    }

    #[test]
    fn test_split_refused_at_depth_limit() {
        let mut tri = square(2, 2);
        let before = tri.heap_bytes().to_vec();
        let stats = tri.update_pass(|_| LodDecision::Split).unwrap();
        assert_eq!(stats.refused, 4);
        assert_eq!(stats.splits, 0);
        assert_eq!(tri.heap_bytes(), &before[..]);
    }

    #[test]
    fn test_merge_collapses_diamond_pairs() {
        let mut tri = square(4, 0);
        tri.update_pass(|_| LodDecision::Split).unwrap();
        tri.update_pass(|_| LodDecision::Split).unwrap();
        assert_eq!(tri.leaf_count(), 4);

        // each surviving sibling pair merges once; the partner request
        // arrives on an already-merged slot and is skipped
        let stats = tri.update_pass(|_| LodDecision::Merge).unwrap();
        assert_eq!(stats.merges, 2);
        assert_eq!(stats.kept, 2);
        assert_eq!(tri.leaf_count(), 2);
        assert!(tri.cbt().is_leaf(n(2)));
        assert!(tri.cbt().is_leaf(n(3)));
    }

    #[test]
    fn test_single_diamond_pair_merges() {
        let mut tri = square(4, 0);
        tri.update_pass(|_| LodDecision::Split).unwrap();
        tri.update_pass(|_| LodDecision::Split).unwrap();
        assert_eq!(tri.leaf_count(), 4);

        // one diamond pair asks to merge: count drops by one and the
        // parent becomes a leaf again
        let stats = tri
            .update_pass(|leaf| match leaf.node.id {
                4 | 5 => LodDecision::Merge,
                _ => LodDecision::Keep,
            })
            .unwrap();
        assert_eq!(stats.merges, 1);
        assert_eq!(tri.leaf_count(), 3);
        assert!(tri.cbt().is_leaf(n(2)));
        tri.cbt().validate().unwrap();
    }

    #[test]
    fn test_merge_refused_while_partner_deep() {
        let mut tri = square(5, 1);
        tri.split_leaf(n(2)).unwrap();
        tri.split_leaf(n(4)).unwrap();
        let before = tri.heap_bytes().to_vec();

        // node 5's parent still holds three leaves across the diagonal
        let stats = tri
            .update_pass(|leaf| {
                if leaf.node == n(5) {
                    LodDecision::Merge
                } else {
                    LodDecision::Keep
                }
            })
            .unwrap();
        assert_eq!(stats.refused, 1);
        assert_eq!(stats.merges, 0);
        assert_eq!(tri.heap_bytes(), &before[..]);
    }

    #[test]
    fn test_keep_is_identity() {
        let mut tri = square(6, 3);
        tri.split_leaf(tri.leaf(2).node).unwrap();
        let before = tri.heap_bytes().to_vec();
        let stats = tri.update_pass(|_| LodDecision::Keep).unwrap();
        assert_eq!(stats.kept, tri.leaf_count());
        assert_eq!(stats.splits + stats.merges + stats.refused, 0);
        assert_eq!(tri.heap_bytes(), &before[..]);
    }

    #[test]
    fn test_conflicting_requests_resolve_by_rank() {
        let mut tri = square(4, 1);
        tri.split_leaf(n(2)).unwrap();
        assert_eq!(tri.leaf_count(), 3);

        // rank order is 4, 5, 3: the merge of 4 lands first and flips
        // 5's leaf status, so 5's split request is skipped
        let stats = tri
            .update_pass(|leaf| match leaf.node.id {
                4 => LodDecision::Merge,
                5 => LodDecision::Split,
                _ => LodDecision::Keep,
            })
            .unwrap();
        assert_eq!(stats.merges, 1);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.kept, 2);
        assert_eq!(tri.leaf_count(), 2);
        tri.cbt().validate().unwrap();
    }

    #[test]
    fn test_distance_driven_passes_converge() {
        // refine toward a corner of the square until no leaf wants more
        // detail, then check the pass is a fixed point
        // nearest depth-2 midpoints sit ~0.41 from the target, so the
        // radius has to reach past them to recruit any refinement
        let target = glam::Vec2::new(0.1, 0.1);
        let classify = move |leaf: &Leaf| {
            let distance = (leaf.triangle.hypotenuse_midpoint() - target).length();
            let want = if distance < 0.45 { 6 } else { 2 };
            if leaf.node.depth < want {
                LodDecision::Split
            } else {
                LodDecision::Keep
            }
        };

        let mut tri = square(8, 1);
        for _ in 0..8 {
            tri.update_pass(classify).unwrap();
        }
        let stats = tri.update_pass(classify).unwrap();
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.refused, 0);
        assert!(tri.leaf_count() > 4);
        tri.cbt().validate().unwrap();
    }
}
