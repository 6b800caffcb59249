//! Bit-packed concurrent binary tree heap
//!
//! A single flat `Vec<u64>` stores both the depth-`D` leaf bitfield and
//! the subtree bit-counts of every shallower depth. A node at depth `d`
//! with heap index `id` owns a field of `D - d + 1` bits at bit offset
//! `2^(d+1) + id * (D - d + 1)`; the per-depth regions tile the buffer
//! contiguously for a total of `2^(D+2)` bits, with bits `[0, D+3)`
//! unused padding. Depth-`D` fields are the one-bit leaf bitfield.
//!
//! A leaf at depth `d < D` is encoded by the set bit of its leftmost
//! depth-`D` descendant; once the sums have been reduced,
//! `heap_read(node) == 1` identifies leaves in any valid crack-free
//! state, at whatever depth the descent reaches them.

use serde::{Deserialize, Serialize};

use super::node::Node;
use crate::core::error::Error;
use crate::core::types::Result;

/// Deepest subdivision level supported
///
/// Keeps child indices within `u32` and matches the 29-level cap of the
/// interactive tooling this structure is uploaded to.
pub const MAX_SUPPORTED_DEPTH: u32 = 29;

/// Construction parameters for a [`Cbt`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CbtConfig {
    /// Deepest level a leaf may reach
    pub max_depth: u32,
    /// Uniform depth of the initial leaf set (0 = single root leaf)
    pub init_depth: u32,
}

impl Default for CbtConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            init_depth: 1,
        }
    }
}

/// Concurrent binary tree over `2^max_depth` leaf slots
#[derive(Clone, Debug)]
pub struct Cbt {
    heap: Vec<u64>,
    max_depth: u32,
}

fn field_mask(count: u32) -> u64 {
    debug_assert!(count >= 1 && count <= 64);
    if count == 64 { u64::MAX } else { (1u64 << count) - 1 }
}

impl Cbt {
    /// Allocate a tree and seed `2^init_depth` uniform leaves
    pub fn new(config: &CbtConfig) -> Result<Self> {
        if config.max_depth < 1 || config.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(Error::Allocation(format!(
                "max_depth {} outside supported range 1..={MAX_SUPPORTED_DEPTH}",
                config.max_depth
            )));
        }
        if config.init_depth > config.max_depth {
            return Err(Error::Allocation(format!(
                "init_depth {} exceeds max_depth {}",
                config.init_depth, config.max_depth
            )));
        }

        let words = Self::byte_size_for(config.max_depth) / 8;
        let mut cbt = Self {
            heap: vec![0u64; words],
            max_depth: config.max_depth,
        };
        let stride = 1u64 << (config.max_depth - config.init_depth);
        for i in 0..(1u64 << config.init_depth) {
            cbt.set_bit(i * stride, true);
        }
        cbt.reduce_full();
        log::debug!(
            "created CBT: max_depth={}, init_depth={}, {} heap bytes",
            config.max_depth,
            config.init_depth,
            cbt.heap_byte_size()
        );
        Ok(cbt)
    }

    /// Restore a tree from a raw heap image previously taken via
    /// [`heap_bytes`](Self::heap_bytes)
    pub fn from_raw(max_depth: u32, bytes: &[u8]) -> Result<Self> {
        if max_depth < 1 || max_depth > MAX_SUPPORTED_DEPTH {
            return Err(Error::Allocation(format!(
                "max_depth {max_depth} outside supported range 1..={MAX_SUPPORTED_DEPTH}"
            )));
        }
        let expected = Self::byte_size_for(max_depth);
        if bytes.len() != expected {
            return Err(Error::InvalidHeapImage {
                expected,
                found: bytes.len(),
            });
        }
        Ok(Self {
            heap: bytemuck::pod_collect_to_vec(bytes),
            max_depth,
        })
    }

    /// Heap buffer size in bytes for a given maximum depth
    ///
    /// Pure function of the depth; `2^(max_depth + 2)` bits rounded up to
    /// word granularity.
    pub fn byte_size_for(max_depth: u32) -> usize {
        let bits = 1usize << (max_depth + 2);
        bits.div_ceil(64) * 8
    }

    /// Size of this tree's heap buffer in bytes
    pub fn heap_byte_size(&self) -> usize {
        self.heap.len() * 8
    }

    /// Raw heap image, suitable for upload to a compute device
    pub fn heap_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.heap)
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of active leaves; the root sum, valid after a reduction
    pub fn leaf_count(&self) -> u64 {
        self.heap_read(Node::ROOT)
    }

    /// Whether `node` is an active leaf (valid after a reduction)
    pub fn is_leaf(&self, node: Node) -> bool {
        self.heap_read(node) == 1
    }

    /// Whether `node` sits at the maximum depth and can never split
    pub fn is_ceil(&self, node: Node) -> bool {
        node.depth >= self.max_depth
    }

    // ---- depth-D bitfield access ------------------------------------

    /// Read the leaf bit at slot `i` in `[0, 2^max_depth)`
    pub fn get_bit(&self, i: u64) -> bool {
        debug_assert!(i < 1u64 << self.max_depth);
        self.read_bits((3u64 << self.max_depth) + i, 1) != 0
    }

    /// Write the leaf bit at slot `i` in `[0, 2^max_depth)`
    pub fn set_bit(&mut self, i: u64, value: bool) {
        debug_assert!(i < 1u64 << self.max_depth);
        self.write_bits((3u64 << self.max_depth) + i, 1, value as u64);
    }

    /// Bitfield slot of `node`'s leftmost depth-`max_depth` descendant,
    /// i.e. the slot holding the node's own leaf bit
    pub fn bitfield_slot(&self, node: Node) -> u64 {
        debug_assert!(node.depth <= self.max_depth);
        ((node.id as u64) << (self.max_depth - node.depth)) - (1u64 << self.max_depth)
    }

    /// Flip `node`'s leaf bit to `value`; returns the touched slot, or
    /// `None` when the bit already had that value
    pub(crate) fn set_leaf_bit(&mut self, node: Node, value: bool) -> Option<u64> {
        let slot = self.bitfield_slot(node);
        if self.get_bit(slot) == value {
            return None;
        }
        self.set_bit(slot, value);
        Some(slot)
    }

    // ---- packed field access ----------------------------------------

    pub(crate) fn node_bit_size(&self, node: Node) -> u32 {
        self.max_depth - node.depth + 1
    }

    pub(crate) fn node_bit_id(&self, node: Node) -> u64 {
        (2u64 << node.depth) + (node.id as u64) * (self.node_bit_size(node) as u64)
    }

    /// Read the packed field of `node`: its leaf bit at the deepest
    /// level, its subtree bit-count everywhere else
    pub fn heap_read(&self, node: Node) -> u64 {
        self.read_bits(self.node_bit_id(node), self.node_bit_size(node))
    }

    /// Overwrite the packed field of `node`; reduction engine only
    pub(crate) fn heap_write(&mut self, node: Node, value: u64) {
        self.write_bits(self.node_bit_id(node), self.node_bit_size(node), value);
    }

    pub(crate) fn read_bits(&self, start: u64, count: u32) -> u64 {
        let word = (start >> 6) as usize;
        let offset = (start & 63) as u32;
        let first = (64 - offset).min(count);
        let mut value = (self.heap[word] >> offset) & field_mask(first);
        if first < count {
            value |= (self.heap[word + 1] & field_mask(count - first)) << first;
        }
        value
    }

    pub(crate) fn write_bits(&mut self, start: u64, count: u32, value: u64) {
        debug_assert!(count == 64 || value < 1u64 << count);
        let word = (start >> 6) as usize;
        let offset = (start & 63) as u32;
        let first = (64 - offset).min(count);
        let low_mask = field_mask(first) << offset;
        self.heap[word] = (self.heap[word] & !low_mask) | ((value << offset) & low_mask);
        if first < count {
            let high_mask = field_mask(count - first);
            self.heap[word + 1] =
                (self.heap[word + 1] & !high_mask) | ((value >> first) & high_mask);
        }
    }

    // ---- rank decoding ----------------------------------------------

    /// Locate the `rank`-th active leaf in left-to-right order by a
    /// partial-sum descent from the root; O(max_depth)
    ///
    /// The descent stops at the first node whose field reads 1, so it
    /// terminates at whatever depth the leaf actually sits.
    pub fn decode_node(&self, rank: u64) -> Node {
        debug_assert!(rank < self.leaf_count());
        let mut node = Node::ROOT;
        let mut rank = rank;
        while self.heap_read(node) > 1 {
            let left = node.left_child();
            let left_sum = self.heap_read(left);
            if rank < left_sum {
                node = left;
            } else {
                rank -= left_sum;
                node = left.sibling();
            }
        }
        node
    }

    /// Defensive check of the reduction invariant: every internal node's
    /// field equals the sum of its children's fields
    pub fn validate(&self) -> Result<()> {
        for depth in 0..self.max_depth {
            for id in (1u32 << depth)..(2u32 << depth) {
                let node = Node::new(id, depth);
                let expected =
                    self.heap_read(node.left_child()) + self.heap_read(node.right_child());
                let found = self.heap_read(node);
                if found != expected {
                    return Err(Error::InvariantViolation {
                        node,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}
