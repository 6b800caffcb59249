//! Binary-tree node addressing
//!
//! Nodes are (heap index, depth) pairs. The heap index of a node at depth
//! `d` lies in `[2^d, 2^(d+1))`; its low `d` bits spell the root-to-node
//! path, most significant bit first (0 = left, 1 = right). All navigation
//! is shift/XOR arithmetic on the index, no buffer access.

/// A node of the subdivision tree
///
/// Index 0 is the null sentinel and never appears in a `Node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Node {
    /// Heap index; the leading 1 bit encodes the depth
    pub id: u32,
    /// Distance from the root (root is depth 0)
    pub depth: u32,
}

impl Node {
    /// The root node, covering the whole base domain
    pub const ROOT: Node = Node { id: 1, depth: 0 };

    /// Create a node from an index/depth pair
    pub fn new(id: u32, depth: u32) -> Self {
        debug_assert!(id >> depth == 1, "id {id} is not at depth {depth}");
        Self { id, depth }
    }

    /// Recover a node from its heap index alone (`depth = floor(log2(id))`)
    pub fn from_id(id: u32) -> Self {
        debug_assert!(id >= 1, "index 0 is the null sentinel");
        Self {
            id,
            depth: id.ilog2(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == 1
    }

    pub fn parent(&self) -> Node {
        debug_assert!(!self.is_root());
        Node {
            id: self.id >> 1,
            depth: self.depth - 1,
        }
    }

    pub fn left_child(&self) -> Node {
        Node {
            id: self.id << 1,
            depth: self.depth + 1,
        }
    }

    pub fn right_child(&self) -> Node {
        Node {
            id: self.id << 1 | 1,
            depth: self.depth + 1,
        }
    }

    /// The other child of this node's parent
    pub fn sibling(&self) -> Node {
        debug_assert!(!self.is_root());
        Node {
            id: self.id ^ 1,
            depth: self.depth,
        }
    }

    /// This node or its sibling, whichever is the left child
    pub fn left_sibling(&self) -> Node {
        debug_assert!(!self.is_root());
        Node {
            id: self.id & !1,
            depth: self.depth,
        }
    }

    /// This node or its sibling, whichever is the right child
    pub fn right_sibling(&self) -> Node {
        debug_assert!(!self.is_root());
        Node {
            id: self.id | 1,
            depth: self.depth,
        }
    }

    /// Path bit at `level`, where level 0 is the step taken from the root
    pub fn path_bit(&self, level: u32) -> u32 {
        debug_assert!(level < self.depth);
        (self.id >> (self.depth - 1 - level)) & 1
    }
}
