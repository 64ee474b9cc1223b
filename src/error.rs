//! Error types for the store.

use thiserror::Error;

/// Main error type for store operations.
///
/// Core state transitions (merge, notify, history) never fail; errors only
/// arise at the storage boundary, when constructing or using a backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("Storage is locked by another process")]
    Locked,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
