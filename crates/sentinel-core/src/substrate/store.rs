//! `Store` — durable persistence for every entity the control loop
//! accumulates across restarts.
//!
//! One trait covers all entities rather than one trait per entity (unlike
//! the content-addressed and run-ledger split a blob-and-events substrate
//! would use) because the orchestrator's entities share a read/write
//! pattern: upsert by id, fetch by id, list filtered by repository and
//! status, and — for the audit trail only — an append-only insert with no
//! update or delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ApprovalRequest, AuditEntry, CircuitState, DecisionRecord, Failure, FailureSignature,
    HealthCheck, Pattern, PersonalityProfile, Snapshot,
};
use crate::error::Result;

/// Filter applied when listing entities scoped to a repository.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub repository: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

impl ListFilter {
    pub fn for_repository(repository: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            status: None,
            limit: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter for audit-trail queries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub failure_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Durable storage for the orchestrator's entities.
///
/// Implementations must guarantee: `upsert` is idempotent on the entity's
/// id; `get` returns `None` (not an error) for an absent id; audit entries
/// are insert-only and returned in ascending timestamp order.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_failure(&self, failure: &Failure) -> Result<()>;
    async fn get_failure(&self, failure_id: Uuid) -> Result<Option<Failure>>;
    async fn list_failures(&self, filter: &ListFilter) -> Result<Vec<Failure>>;

    async fn upsert_decision(&self, decision: &DecisionRecord) -> Result<()>;
    async fn decisions_for_failure(&self, failure_id: Uuid) -> Result<Vec<DecisionRecord>>;
    async fn recent_decisions(&self, limit: u32) -> Result<Vec<DecisionRecord>>;

    async fn upsert_circuit(&self, state: &CircuitState) -> Result<()>;
    async fn get_circuit(&self, signature: &FailureSignature) -> Result<Option<CircuitState>>;

    async fn upsert_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
    async fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<Snapshot>>;
    async fn list_snapshots(&self, filter: &ListFilter) -> Result<Vec<Snapshot>>;
    /// Permanently remove a snapshot past its retention window. Cleanup
    /// only; a snapshot still eligible for rollback must never be deleted.
    async fn delete_snapshot(&self, snapshot_id: Uuid) -> Result<()>;

    async fn upsert_health_check(&self, check: &HealthCheck) -> Result<()>;
    async fn get_health_check(&self, check_id: Uuid) -> Result<Option<HealthCheck>>;
    async fn pending_health_checks(&self, before: DateTime<Utc>) -> Result<Vec<HealthCheck>>;

    async fn upsert_approval(&self, approval: &ApprovalRequest) -> Result<()>;
    async fn get_approval(&self, request_id: Uuid) -> Result<Option<ApprovalRequest>>;
    async fn pending_approvals(&self, filter: &ListFilter) -> Result<Vec<ApprovalRequest>>;

    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<()>;
    async fn list_patterns(&self, filter: &ListFilter) -> Result<Vec<Pattern>>;

    async fn upsert_personality(&self, profile: &PersonalityProfile) -> Result<()>;
    async fn get_personality(&self, repository: &str) -> Result<Option<PersonalityProfile>>;

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;
}
