//! Error types for DriftKV
//!
//! Provides a unified error type for all storage-core operations.

use thiserror::Error;

/// Result type alias using DriftError
pub type Result<T> = std::result::Result<T, DriftError>;

/// Unified error type for DriftKV operations
#[derive(Debug, Error)]
pub enum DriftError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    /// The segment allocator cannot fit the record; rotate to a new segment.
    #[error("insufficient space in WAL segment: requested {requested} bytes, {available} available")]
    InsufficientSpace { requested: u64, available: i64 },

    #[error("incomplete write: expected {expected} bytes, wrote {actual}")]
    IncompleteWrite { expected: usize, actual: usize },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    // -------------------------------------------------------------------------
    // Value File Errors
    // -------------------------------------------------------------------------
    #[error("incomplete value: expected {expected} bytes, got {actual}")]
    IncompleteValue { expected: usize, actual: usize },

    #[error("bad value checksum: stored {expected:#010x}, computed {actual:#010x}")]
    BadChecksum { expected: u32, actual: u32 },

    #[error("could not create checksum for value: hashed {hashed} of {expected} bytes")]
    ChecksumCreation { expected: usize, hashed: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DriftError {
    /// True when the error only means the current segment is full.
    pub fn is_insufficient_space(&self) -> bool {
        matches!(self, DriftError::InsufficientSpace { .. })
    }

    /// True for errors that mean on-disk bytes cannot be trusted and the
    /// record has to be rebuilt from the WAL.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            DriftError::BadChecksum { .. }
                | DriftError::IncompleteValue { .. }
                | DriftError::IncompleteWrite { .. }
                | DriftError::Decode(_)
        )
    }
}
