//! A minimal in-crate `Store` fake for this crate's own unit tests.
//!
//! `sentinel-store::InMemoryStore` can't be used here — that crate depends
//! on this one for the `Store` trait and domain types, so depending on it
//! back would be circular. This is the same shape, kept private to tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ApprovalRequest, AuditEntry, CircuitState, DecisionRecord, Failure, FailureSignature, HealthCheck, Pattern,
    PersonalityProfile, Snapshot,
};
use crate::substrate::store::{AuditFilter, ListFilter};
use crate::substrate::Store;
use crate::Result;

#[derive(Default)]
pub struct InMemoryStore {
    failures: Mutex<HashMap<Uuid, Failure>>,
    decisions: Mutex<Vec<DecisionRecord>>,
    circuits: Mutex<HashMap<String, CircuitState>>,
    snapshots: Mutex<HashMap<Uuid, Snapshot>>,
    health_checks: Mutex<HashMap<Uuid, HealthCheck>>,
    approvals: Mutex<HashMap<Uuid, ApprovalRequest>>,
    patterns: Mutex<Vec<Pattern>>,
    personalities: Mutex<HashMap<String, PersonalityProfile>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(repository: &str, filter: &ListFilter) -> bool {
    filter.repository.as_deref().map_or(true, |r| r == repository)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_failure(&self, failure: &Failure) -> Result<()> {
        self.failures.lock().unwrap().insert(failure.failure_id, failure.clone());
        Ok(())
    }

    async fn get_failure(&self, failure_id: Uuid) -> Result<Option<Failure>> {
        Ok(self.failures.lock().unwrap().get(&failure_id).cloned())
    }

    async fn list_failures(&self, filter: &ListFilter) -> Result<Vec<Failure>> {
        let mut out: Vec<Failure> = self
            .failures
            .lock()
            .unwrap()
            .values()
            .filter(|f| matches_filter(&f.repository, filter))
            .cloned()
            .collect();
        out.sort_by_key(|f| f.detected_at);
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn upsert_decision(&self, decision: &DecisionRecord) -> Result<()> {
        self.decisions.lock().unwrap().push(decision.clone());
        Ok(())
    }

    async fn decisions_for_failure(&self, failure_id: Uuid) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .decisions
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.failure_id == failure_id)
            .cloned()
            .collect())
    }

    async fn recent_decisions(&self, limit: u32) -> Result<Vec<DecisionRecord>> {
        let decisions = self.decisions.lock().unwrap();
        Ok(decisions.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn upsert_circuit(&self, state: &CircuitState) -> Result<()> {
        self.circuits
            .lock()
            .unwrap()
            .insert(state.signature.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn get_circuit(&self, signature: &FailureSignature) -> Result<Option<CircuitState>> {
        Ok(self.circuits.lock().unwrap().get(signature.as_str()).cloned())
    }

    async fn upsert_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.lock().unwrap().insert(snapshot.snapshot_id, snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.lock().unwrap().get(&snapshot_id).cloned())
    }

    async fn list_snapshots(&self, filter: &ListFilter) -> Result<Vec<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .values()
            .filter(|s| matches_filter(&s.repository, filter))
            .cloned()
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: Uuid) -> Result<()> {
        self.snapshots.lock().unwrap().remove(&snapshot_id);
        Ok(())
    }

    async fn upsert_health_check(&self, check: &HealthCheck) -> Result<()> {
        self.health_checks.lock().unwrap().insert(check.check_id, check.clone());
        Ok(())
    }

    async fn get_health_check(&self, check_id: Uuid) -> Result<Option<HealthCheck>> {
        Ok(self.health_checks.lock().unwrap().get(&check_id).cloned())
    }

    async fn pending_health_checks(&self, before: DateTime<Utc>) -> Result<Vec<HealthCheck>> {
        Ok(self
            .health_checks
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.executed_at.is_none() && c.scheduled_at <= before)
            .cloned()
            .collect())
    }

    async fn upsert_approval(&self, approval: &ApprovalRequest) -> Result<()> {
        self.approvals.lock().unwrap().insert(approval.request_id, approval.clone());
        Ok(())
    }

    async fn get_approval(&self, request_id: Uuid) -> Result<Option<ApprovalRequest>> {
        Ok(self.approvals.lock().unwrap().get(&request_id).cloned())
    }

    async fn pending_approvals(&self, filter: &ListFilter) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .approvals
            .lock()
            .unwrap()
            .values()
            .filter(|a| matches_filter(&a.repository, filter))
            .cloned()
            .collect())
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<()> {
        self.patterns.lock().unwrap().push(pattern.clone());
        Ok(())
    }

    async fn list_patterns(&self, filter: &ListFilter) -> Result<Vec<Pattern>> {
        Ok(self
            .patterns
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches_filter(&p.repository, filter))
            .cloned()
            .collect())
    }

    async fn upsert_personality(&self, profile: &PersonalityProfile) -> Result<()> {
        self.personalities
            .lock()
            .unwrap()
            .insert(profile.repository.clone(), profile.clone());
        Ok(())
    }

    async fn get_personality(&self, repository: &str) -> Result<Option<PersonalityProfile>> {
        Ok(self.personalities.lock().unwrap().get(repository).cloned())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let audit = self.audit.lock().unwrap();
        let mut out: Vec<AuditEntry> = audit
            .iter()
            .filter(|entry| filter.failure_id.map_or(true, |id| entry.failure_id == Some(id)))
            .filter(|entry| filter.since.map_or(true, |since| entry.timestamp >= since))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.timestamp);
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }
}
