//! Decoding node paths into triangle corners
//!
//! Corners are never stored; each query replays the node's path from the
//! base domain, halving the hypotenuse once per bit. Corner order is the
//! bisection frame: `a`-`c` is the hypotenuse (the next edge to split)
//! and `b` the right-angle corner. Each bisection mirrors the frame, so
//! the decoded triangle is re-wound to counter-clockwise at the end
//! based on how many bisections the path performed.

use glam::Vec2;

use super::Domain;
use crate::cbt::Node;

/// A decoded triangle in the unit domain
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: Vec2,
    pub b: Vec2,
    pub c: Vec2,
}

/// Lower-left half of the unit square; also the `Domain::Triangle` base
const BASE_LOWER: Triangle = Triangle {
    a: Vec2::new(0.0, 1.0),
    b: Vec2::new(0.0, 0.0),
    c: Vec2::new(1.0, 0.0),
};

/// Upper-right half of the unit square, mirrored across the diagonal
const BASE_UPPER: Triangle = Triangle {
    a: Vec2::new(1.0, 0.0),
    b: Vec2::new(1.0, 1.0),
    c: Vec2::new(0.0, 1.0),
};

impl Triangle {
    /// Bisect the hypotenuse and keep the child selected by `bit`
    ///
    /// Both children put the new midpoint at the right-angle corner and
    /// their own hypotenuse at `a`-`c`, which is what keeps repeated
    /// bisection always cutting the longest edge.
    fn split(&self, bit: u32) -> Triangle {
        let m = (self.a + self.c) * 0.5;
        if bit == 0 {
            Triangle { a: self.a, b: m, c: self.b }
        } else {
            Triangle { a: self.b, b: m, c: self.c }
        }
    }

    /// Midpoint of the hypotenuse; the vertex a split would insert
    pub fn hypotenuse_midpoint(&self) -> Vec2 {
        (self.a + self.c) * 0.5
    }

    /// Signed area; positive for counter-clockwise winding
    pub fn area(&self) -> f32 {
        let ab = self.b - self.a;
        let ac = self.c - self.a;
        0.5 * (ab.x * ac.y - ab.y * ac.x)
    }
}

/// Decode the corner coordinates of `node`'s triangle
///
/// In `Domain::Square` the root (depth 0) is the whole square and has no
/// triangle shape of its own; it decodes to the upper diagonal half.
pub fn decode_triangle(node: Node, domain: Domain) -> Triangle {
    let (mut tri, first_level) = match domain {
        Domain::Triangle => (BASE_LOWER, 0),
        Domain::Square => {
            if node.depth == 0 {
                return BASE_UPPER;
            }
            let base = if node.path_bit(0) == 0 { BASE_LOWER } else { BASE_UPPER };
            (base, 1)
        }
    };
    for level in first_level..node.depth {
        tri = tri.split(node.path_bit(level));
    }
    // one mirror per bisection: restore counter-clockwise winding
    if (node.depth - first_level) & 1 == 1 {
        tri = Triangle { a: tri.c, b: tri.b, c: tri.a };
    }
    tri
}
