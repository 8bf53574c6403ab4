//! Error types for the record store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index {index} out of bounds (size is {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    #[error("Store is empty")]
    Empty,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Compaction failed: {0}")]
    Compaction(String),

    #[error("Store is locked by another handle")]
    Locked,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
