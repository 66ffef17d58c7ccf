//! `AuditEntry` — the append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of action an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Poll,
    Classify,
    Gate,
    Snapshot,
    BranchCreate,
    FileEdit,
    PrOpen,
    PrComment,
    Approval,
    HealthCheck,
    Rollback,
    Notify,
    CircuitTransition,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Pending,
}

/// One append-only audit record. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action_kind: ActionKind,
    pub failure_id: Option<Uuid>,
    pub outcome: Outcome,
    pub details: serde_json::Value,
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action_kind: ActionKind,
        failure_id: Option<Uuid>,
        outcome: Outcome,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: now,
            actor: actor.into(),
            action_kind,
            failure_id,
            outcome,
            details,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
