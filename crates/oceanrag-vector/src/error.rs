//! Error types for oceanrag-vector.

use thiserror::Error;

/// Result type for oceanrag-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in oceanrag-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// A chunk id is already present in the index (or repeated in a batch).
    #[error("Duplicate chunk id '{0}'")]
    DuplicateKey(String),

    /// Invalid vector (e.g., empty, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Snapshot bytes failed magic, version, checksum or decode checks.
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Persistence error (serialization, layout mismatch, etc.).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
