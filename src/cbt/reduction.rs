//! Bottom-up sum reduction over the packed heap
//!
//! Recomputes each internal node's subtree bit-count one depth layer at a
//! time, leaves first. A layer only reads the next-deeper layer, so every
//! node within it is independent; the generic pass computes a layer in
//! parallel and commits it before moving shallower, which is the same
//! barrier discipline the compute-shader version enforces between
//! dispatches.
//!
//! The five deepest layers are folded into a per-word prepass: one 64-bit
//! bitfield word yields 32 two-bit sums, 16 three-bit sums, and so on,
//! through pairwise-add/repack bit tricks, leaving the generic pass only
//! `2^(max_depth - 5)` nodes of work.

use rayon::prelude::*;

use super::heap::Cbt;
use super::node::Node;

/// Depth layers folded into the per-word prepass
const PREPASS_LAYERS: u32 = 5;

/// Pairwise-add masks, one per prepass layer
const SUM_MASKS: [u64; PREPASS_LAYERS as usize] = [
    0x5555_5555_5555_5555,
    0x3333_3333_3333_3333,
    0x0f0f_0f0f_0f0f_0f0f,
    0x00ff_00ff_00ff_00ff,
    0x0000_ffff_0000_ffff,
];

impl Cbt {
    /// Recompute every internal sum from the leaf bitfield up
    pub fn reduce_full(&mut self) {
        let max_depth = self.max_depth();
        let mut depth = max_depth;
        if max_depth > PREPASS_LAYERS {
            self.reduce_prepass();
            depth = max_depth - PREPASS_LAYERS;
        }
        while depth > 0 {
            depth -= 1;
            self.reduce_layer(depth);
        }
    }

    /// Recompute the ancestors of a single depth-`max_depth` bitfield
    /// slot, leaf to root; O(max_depth)
    ///
    /// The per-mutation fast path: after a batch of split/merge bit
    /// flips, either call this once per touched slot or fall back to
    /// [`reduce_full`](Self::reduce_full) when enough bits moved.
    pub fn reduce_path(&mut self, slot: u64) {
        debug_assert!(slot < 1u64 << self.max_depth());
        let leaf_id = (1u64 << self.max_depth()) + slot;
        let mut node = Node::new(leaf_id as u32, self.max_depth());
        while !node.is_root() {
            node = node.parent();
            let sum = self.heap_read(node.left_child()) + self.heap_read(node.right_child());
            self.heap_write(node, sum);
        }
    }

    /// Generic single-layer pass: compute all sums at `depth` from the
    /// layer below, then commit them
    fn reduce_layer(&mut self, depth: u32) {
        let first = 1u32 << depth;
        let this: &Cbt = self;
        let sums: Vec<u64> = (first..2 * first)
            .into_par_iter()
            .map(|id| {
                let node = Node::new(id, depth);
                this.heap_read(node.left_child()) + this.heap_read(node.right_child())
            })
            .collect();
        for (i, sum) in sums.into_iter().enumerate() {
            self.heap_write(Node::new(first + i as u32, depth), sum);
        }
    }

    /// Per-word pass over the leaf bitfield covering the five deepest
    /// sum layers
    ///
    /// Layer `l` holds 64 >> l sums per word, each `l + 1` bits wide in
    /// the heap but `2^l` bits wide in the pairwise-add accumulator, so
    /// every layer past the first repacks its fields before writing.
    fn reduce_prepass(&mut self) {
        let max_depth = self.max_depth();
        debug_assert!(max_depth > PREPASS_LAYERS);
        let word_count = 1usize << (max_depth - 6);
        let base_word = 3usize << (max_depth - 6);

        for j in 0..word_count {
            let mut sums = self.read_word(base_word + j);
            for layer in 1..=PREPASS_LAYERS {
                let mask = SUM_MASKS[(layer - 1) as usize];
                sums = (sums & mask) + ((sums >> (1u32 << (layer - 1))) & mask);

                let depth = max_depth - layer;
                let nodes_per_word = 64u64 >> layer;
                let wide = 1u64 << layer; // accumulator field width
                let packed_width = (layer + 1) as u64; // heap field width
                let first = Node::new((1u32 << depth) + (nodes_per_word as u32) * j as u32, depth);
                if wide == packed_width {
                    // layer 1: 32 two-bit sums already fill one word
                    self.write_bits(self.node_bit_id(first), 64, sums);
                } else {
                    let mut packed = 0u64;
                    for i in 0..nodes_per_word {
                        packed |= ((sums >> (wide * i)) & ((1 << wide) - 1)) << (packed_width * i);
                    }
                    self.write_bits(
                        self.node_bit_id(first),
                        (packed_width * nodes_per_word) as u32,
                        packed,
                    );
                }
            }
        }
    }

    fn read_word(&self, word: usize) -> u64 {
        self.read_bits((word as u64) << 6, 64)
    }
}
