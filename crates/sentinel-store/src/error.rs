//! Error types for the persistence layer.

use thiserror::Error;

/// Errors raised by a `Store` implementation before they are folded into
/// [`sentinel_core::CoreError::Storage`] at the trait boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("schema setup failed: {0}")]
    Schema(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for sentinel_core::CoreError {
    fn from(err: StoreError) -> Self {
        sentinel_core::CoreError::Storage(err.to_string())
    }
}
