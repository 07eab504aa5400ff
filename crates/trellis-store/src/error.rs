//! Store error types.

use thiserror::Error;

/// Result store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
