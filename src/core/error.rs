//! Error types for the lebtri crate

use thiserror::Error;

use crate::cbt::Node;

/// Main error type for the crate
///
/// `DepthLimitExceeded` and `MergeNotEligible` are expected negative
/// results: the heap is left untouched and the coordinator treats the
/// node as kept. `InvariantViolation` indicates a corrupted reduction
/// and aborts the pass that detects it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("allocation error: {0}")]
    Allocation(String),

    #[error("cannot split {0:?}: node sits at the maximum depth")]
    DepthLimitExceeded(Node),

    #[error("cannot merge {0:?}: diamond partner is still subdivided")]
    MergeNotEligible(Node),

    #[error("sum invariant violated at {node:?}: expected {expected}, found {found}")]
    InvariantViolation {
        node: Node,
        expected: u64,
        found: u64,
    },

    #[error("heap image size mismatch: expected {expected} bytes, found {found}")]
    InvalidHeapImage { expected: usize, found: usize },
}
