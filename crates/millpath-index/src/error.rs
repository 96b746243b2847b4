//! Error types for the spatial indexes.

use thiserror::Error;

/// Errors raised while building or updating an index.
///
/// These are structural failures: an index that hits one of them cannot
/// answer queries correctly, so they are reported instead of skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// A node bound contains NaN or an infinite coordinate.
    #[error("non-finite bound in dimension {dim}")]
    NonFiniteBound {
        /// Offending dimension.
        dim: usize,
    },

    /// Bucket cutoff must hold at least one node.
    #[error("invalid bucket cutoff: {0}")]
    InvalidCutoff(usize),

    /// Cutoff distance or weld tolerance is negative or not finite.
    #[error("invalid tolerance: {0}")]
    InvalidTolerance(f64),
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
