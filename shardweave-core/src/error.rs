//! Error types for Shardweave
//!
//! Provides a unified error type for codec construction, encoding and decoding.

use thiserror::Error;

/// Result type alias for Shardweave operations
pub type Result<T> = std::result::Result<T, ShardweaveError>;

/// Unified error type for Shardweave
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardweaveError {
    // ===== Codec Construction Errors =====
    #[error("Invalid codec parameters: k={k}, n={n} (need 1 <= k <= n <= 256)")]
    InvalidParameters { k: usize, n: usize },

    // ===== Linear Algebra Errors =====
    #[error("Singular matrix: supplied block rows are not linearly independent")]
    SingularMatrix,

    #[error("Shuffle conflict at slot {slot}: block row labels are inconsistent")]
    ShuffleError { slot: usize },

    // ===== Execution Errors =====
    #[error("Operation cancelled")]
    Cancelled,

    // ===== Input Validation Errors =====
    #[error("Shard count mismatch: expected {expected}, got {actual}")]
    ShardCountMismatch { expected: usize, actual: usize },

    #[error("Shard size mismatch: expected at least {expected}, got {actual}")]
    ShardSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid shard index: {index} (max: {max})")]
    InvalidShardIndex { index: usize, max: usize },

    #[error("Insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShardweaveError {
    /// Whether the caller can expect a different outcome by supplying a
    /// different set of blocks.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ShardweaveError::SingularMatrix
                | ShardweaveError::ShuffleError { .. }
                | ShardweaveError::InvalidShardIndex { .. }
                | ShardweaveError::InsufficientShards { .. }
        )
    }
}

impl From<toml::de::Error> for ShardweaveError {
    fn from(err: toml::de::Error) -> Self {
        ShardweaveError::Configuration(err.to_string())
    }
}
