//! Domain-level error taxonomy for the remediation control loop.

/// Errors produced by domain logic and decision services.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failure not found: {0}")]
    FailureNotFound(uuid::Uuid),

    #[error("analysis not found for failure: {0}")]
    AnalysisNotFound(uuid::Uuid),

    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("snapshot hash mismatch for {path}: expected {expected}, found {actual}")]
    SnapshotHashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("circuit breaker open for signature {0}")]
    CircuitOpen(String),

    #[error("upstream timeout")]
    UpstreamTimeout,

    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("upstream rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed upstream response: {0}")]
    ParseMalformed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;
