//! `CircuitState` — per-signature circuit breaker state.
//!
//! Normalization and transition logic live in
//! [`crate::circuit_breaker`]; this module only defines the persisted
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest;

/// A normalized hash of `(repository, branch, error_pattern)`, used as the
/// circuit breaker key and as the learning-substrate recall key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureSignature(pub String);

impl FailureSignature {
    /// Hash `(repository, branch, normalized_reason)` into a signature.
    /// Callers are expected to have already normalized `reason` (see
    /// [`crate::circuit_breaker::normalize_reason`]).
    pub fn new(repository: &str, branch: &str, normalized_reason: &str) -> Self {
        let mut hasher = sha2::Sha256::new();
        hasher.update(repository.as_bytes());
        hasher.update(b"\0");
        hasher.update(branch.as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized_reason.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FailureSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three states of a per-signature circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// One recorded transition in a circuit's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitTransition {
    pub from: CircuitStatus,
    pub to: CircuitStatus,
    pub reason: String,
    pub at: DateTime<Utc>,
    pub actor: String,
}

/// Durable per-signature circuit breaker state.
///
/// Created lazily on first failure for a signature; never deleted.
/// `failure_count` resets to 0 on every successful remediation for that
/// signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitState {
    pub signature: FailureSignature,
    pub state: CircuitStatus,
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub auto_reset_at: Option<DateTime<Utc>>,
    pub history: Vec<CircuitTransition>,
}

impl CircuitState {
    /// A fresh, CLOSED circuit for a signature seen for the first time.
    pub fn new(signature: FailureSignature) -> Self {
        Self {
            signature,
            state: CircuitStatus::Closed,
            failure_count: 0,
            last_failure_at: None,
            opened_at: None,
            auto_reset_at: None,
            history: Vec::new(),
        }
    }

    pub fn record_transition(&mut self, to: CircuitStatus, reason: impl Into<String>, actor: impl Into<String>, at: DateTime<Utc>) {
        self.history.push(CircuitTransition {
            from: self.state,
            to,
            reason: reason.into(),
            at,
            actor: actor.into(),
        });
        self.state = to;
    }
}
