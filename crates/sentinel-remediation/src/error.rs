//! Error types for the control loop.

use thiserror::Error;

/// Errors raised while driving a Failure through the control loop, before
/// they are folded into [`sentinel_core::CoreError`] or surfaced to the
/// Orchestrator's caller.
#[derive(Error, Debug)]
pub enum RemediationError {
    #[error("upstream call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("could not parse model response after all strategies: {0}")]
    ParseExhausted(String),

    #[error("analysis missing or invalid error_type")]
    InvalidErrorType,

    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("snapshot capture failed, aborting remediation: {0}")]
    SnapshotFailed(String),

    #[error("approval request {0} expired before resolution")]
    ApprovalExpired(uuid::Uuid),

    #[error("approval request {0} was rejected")]
    ApprovalRejected(uuid::Uuid),

    #[error("remediation cancelled before completion")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] sentinel_core::CoreError),
}

pub type Result<T> = std::result::Result<T, RemediationError>;

impl From<RemediationError> for sentinel_core::CoreError {
    fn from(err: RemediationError) -> Self {
        match err {
            RemediationError::Core(inner) => inner,
            RemediationError::Timeout(_) => sentinel_core::CoreError::UpstreamTimeout,
            RemediationError::RateLimited { retry_after_secs } => {
                sentinel_core::CoreError::RateLimited { retry_after_secs }
            }
            RemediationError::ParseExhausted(msg) => sentinel_core::CoreError::ParseMalformed(msg),
            other => sentinel_core::CoreError::Storage(other.to_string()),
        }
    }
}
