//! Error types for the subscription database.

use crate::types::SubscriptionId;
use thiserror::Error;

/// Main error type for database operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database not loaded yet")]
    NotReady,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, StoreError>;
