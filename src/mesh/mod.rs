//! Adaptive triangulation façade
//!
//! Ties the packed heap and the bisection layer together behind one
//! type: a [`Triangulation`] owns a [`Cbt`] plus the base [`Domain`],
//! hands out decoded leaves by rank, and keeps the sums reduced across
//! mutations so rank decoding stays valid.

pub mod update;

pub use update::{LodDecision, UpdateStats};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cbt::{Cbt, CbtConfig, Node};
use crate::core::types::Result;
use crate::leb::{self, decode_triangle, Domain, Triangle};

/// Construction parameters for a [`Triangulation`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriangulationConfig {
    /// Deepest subdivision level a leaf may reach
    pub max_depth: u32,
    /// Uniform depth of the initial leaf set
    pub init_depth: u32,
    /// Base domain the triangulation covers
    pub domain: Domain,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            init_depth: 1,
            domain: Domain::Square,
        }
    }
}

/// An active leaf: its heap node and its decoded corner coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leaf {
    pub node: Node,
    pub triangle: Triangle,
}

/// An adaptive longest-edge-bisection triangulation of the base domain
#[derive(Clone, Debug)]
pub struct Triangulation {
    cbt: Cbt,
    domain: Domain,
}

impl Triangulation {
    pub fn new(config: &TriangulationConfig) -> Result<Self> {
        let cbt = Cbt::new(&CbtConfig {
            max_depth: config.max_depth,
            init_depth: config.init_depth,
        })?;
        Ok(Self {
            cbt,
            domain: config.domain,
        })
    }

    /// Restore a triangulation from a raw heap image, e.g. one read back
    /// from a compute device
    pub fn from_raw(max_depth: u32, domain: Domain, bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            cbt: Cbt::from_raw(max_depth, bytes)?,
            domain,
        })
    }

    pub fn cbt(&self) -> &Cbt {
        &self.cbt
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn max_depth(&self) -> u32 {
        self.cbt.max_depth()
    }

    /// Number of active leaf triangles
    pub fn leaf_count(&self) -> u64 {
        self.cbt.leaf_count()
    }

    /// Raw heap image, suitable for upload to a compute device
    pub fn heap_bytes(&self) -> &[u8] {
        self.cbt.heap_bytes()
    }

    pub fn heap_byte_size(&self) -> usize {
        self.cbt.heap_byte_size()
    }

    /// Decode the `rank`-th leaf in left-to-right order
    pub fn leaf(&self, rank: u64) -> Leaf {
        let node = self.cbt.decode_node(rank);
        Leaf {
            node,
            triangle: decode_triangle(node, self.domain),
        }
    }

    /// Iterate all leaves in rank order
    pub fn leaves(&self) -> impl Iterator<Item = Leaf> + '_ {
        (0..self.leaf_count()).map(|rank| self.leaf(rank))
    }

    /// Visit every leaf from the rayon pool; each rank decodes
    /// independently, so this is the bulk extraction path
    pub fn for_each_leaf<F>(&self, f: F)
    where
        F: Fn(Leaf) + Sync + Send,
    {
        (0..self.leaf_count())
            .into_par_iter()
            .for_each(|rank| f(self.leaf(rank)));
    }

    /// Split a single leaf and restore the sums
    pub fn split_leaf(&mut self, node: Node) -> Result<()> {
        let mut touched = Vec::new();
        leb::split_node(&mut self.cbt, node, &mut touched)?;
        self.reduce_touched(touched);
        Ok(())
    }

    /// Split a leaf and cascade across hypotenuses so no T-junction
    /// remains, then restore the sums
    pub fn split_leaf_conforming(&mut self, node: Node) -> Result<()> {
        let mut touched = Vec::new();
        leb::split_node_conforming(&mut self.cbt, node, self.domain, &mut touched)?;
        self.reduce_touched(touched);
        Ok(())
    }

    /// Merge a leaf with its sibling if the surrounding diamond allows
    /// it, then restore the sums
    pub fn merge_leaf(&mut self, node: Node) -> Result<()> {
        let mut touched = Vec::new();
        leb::merge_node(&mut self.cbt, node, self.domain, &mut touched)?;
        self.reduce_touched(touched);
        Ok(())
    }

    /// Re-reduce after a batch of bit flips
    ///
    /// Path reduction costs `64 * max_depth` bit-ops per slot against
    /// `2^max_depth` for a full pass, so past that crossover one full
    /// reduction is cheaper than the accumulated paths.
    pub(crate) fn reduce_touched(&mut self, mut touched: Vec<u64>) {
        if touched.is_empty() {
            return;
        }
        touched.sort_unstable();
        touched.dedup();

        let depth = self.cbt.max_depth() as u64;
        if (touched.len() as u64) * 64 * depth > 1u64 << depth {
            self.cbt.reduce_full();
        } else {
            for slot in touched {
                self.cbt.reduce_path(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;

    fn n(id: u32) -> Node {
        Node::from_id(id)
    }

    fn square(max_depth: u32, init_depth: u32) -> Triangulation {
        Triangulation::new(&TriangulationConfig {
            max_depth,
            init_depth,
            domain: Domain::Square,
        })
        .unwrap()
    }

    #[test]
    fn test_new_matches_config() {
        let tri = square(6, 2);
        assert_eq!(tri.max_depth(), 6);
        assert_eq!(tri.domain(), Domain::Square);
        assert_eq!(tri.leaf_count(), 4);
        assert_eq!(tri.heap_byte_size(), Cbt::byte_size_for(6));
    }

    #[test]
    fn test_leaf_decodes_node_and_triangle() {
        let tri = square(5, 1);
        let leaf = tri.leaf(0);
        assert_eq!(leaf.node, n(2));
        assert_eq!(leaf.triangle, decode_triangle(n(2), Domain::Square));
    }

    #[test]
    fn test_leaves_cover_the_domain() {
        let mut tri = square(6, 3);
        tri.split_leaf(tri.leaf(5).node).unwrap();
        let total: f32 = tri.leaves().map(|leaf| leaf.triangle.area()).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(tri.leaves().count() as u64, tri.leaf_count());
    }

    #[test]
    fn test_rank_decode_matches_bitfield() {
        let mut tri = square(6, 2);
        for rank in [0u64, 2, 3, 1] {
            let node = tri.leaf(rank).node;
            tri.split_leaf(node).unwrap();
        }

        // every rank decodes a distinct leaf, and the decoded leaves' bit
        // positions are exactly the set bits of the heap
        let slots: Vec<u64> = tri
            .leaves()
            .map(|leaf| tri.cbt().bitfield_slot(leaf.node))
            .collect();
        assert_eq!(slots.len() as u64, tri.leaf_count());
        for pair in slots.windows(2) {
            assert!(pair[0] < pair[1], "ranks out of bitfield order");
        }
        for slot in 0..(1u64 << tri.max_depth()) {
            assert_eq!(tri.cbt().get_bit(slot), slots.contains(&slot), "slot {slot}");
        }
    }

    #[test]
    fn test_split_and_merge_roundtrip() {
        let mut tri = square(4, 1);
        let before = tri.heap_bytes().to_vec();

        tri.split_leaf(n(2)).unwrap();
        assert_eq!(tri.leaf_count(), 3);
        assert!(tri.cbt().is_leaf(n(4)));

        tri.merge_leaf(n(5)).unwrap();
        assert_eq!(tri.heap_bytes(), &before[..]);
    }

    #[test]
    fn test_conforming_split_keeps_sums_valid() {
        let mut tri = square(5, 1);
        tri.split_leaf_conforming(n(2)).unwrap();
        assert_eq!(tri.leaf_count(), 4);
        tri.cbt().validate().unwrap();
    }

    #[test]
    fn test_merge_error_propagates() {
        let mut tri = square(5, 1);
        tri.split_leaf(n(2)).unwrap();
        tri.split_leaf(n(4)).unwrap();
        assert!(matches!(
            tri.merge_leaf(n(5)),
            Err(Error::MergeNotEligible(_))
        ));
    }

    #[test]
    fn test_raw_roundtrip_preserves_leaves() {
        let mut tri = square(7, 2);
        tri.split_leaf(tri.leaf(1).node).unwrap();
        let restored =
            Triangulation::from_raw(tri.max_depth(), tri.domain(), tri.heap_bytes()).unwrap();
        assert_eq!(restored.leaf_count(), tri.leaf_count());
        let ours: Vec<_> = tri.leaves().collect();
        let theirs: Vec<_> = restored.leaves().collect();
        assert_eq!(ours, theirs);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = TriangulationConfig {
            max_depth: 12,
            init_depth: 4,
            domain: Domain::Triangle,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TriangulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
