//! `HealthCheck` — post-remediation verification that decides on rollback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The outcome of one named check within a `HealthCheck`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckItem {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// A scheduled, one-shot verification of a remediation's health.
///
/// Created by the Executor immediately after PR open; resolved exactly
/// once, either by the scheduler firing at `scheduled_at` or by recovery
/// on restart: any `HealthCheck` with null `executed_at` is rescheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub check_id: Uuid,
    pub failure_id: Uuid,
    pub remediation_id: Uuid,
    pub snapshot_id: Uuid,
    /// The remediation branch this check evaluates, carried here so the
    /// scheduler can resolve a due check without threading context through
    /// from the `Orchestrator` call that scheduled it.
    pub repository: String,
    pub branch: String,
    pub scheduled_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub passed: Option<bool>,
    pub checks: Vec<HealthCheckItem>,
    pub triggered_rollback: bool,
}

impl HealthCheck {
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        failure_id: Uuid,
        remediation_id: Uuid,
        snapshot_id: Uuid,
        repository: impl Into<String>,
        branch: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            check_id: Uuid::new_v4(),
            failure_id,
            remediation_id,
            snapshot_id,
            repository: repository.into(),
            branch: branch.into(),
            scheduled_at,
            executed_at: None,
            passed: None,
            checks: Vec::new(),
            triggered_rollback: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.executed_at.is_none()
    }

    pub fn resolve(&mut self, checks: Vec<HealthCheckItem>, now: DateTime<Utc>) {
        let passed = checks.iter().all(|c| c.passed);
        self.triggered_rollback = !passed;
        self.passed = Some(passed);
        self.checks = checks;
        self.executed_at = Some(now);
    }
}
