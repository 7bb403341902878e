//! Token store error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Key is absent or its TTL has elapsed.
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Token store unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),

    #[error("Token store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid TTL {0:?}: must be at least one millisecond")]
    InvalidTtl(Duration),

    #[error("Invalid key prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid scan cursor: {0}")]
    InvalidCursor(String),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Transport or connectivity failure; the caller must fail the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
