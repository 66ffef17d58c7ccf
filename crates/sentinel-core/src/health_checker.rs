//! `HealthChecker` — the scheduled, post-remediation verification that
//! decides whether a fix sticks or must be rolled back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{HealthCheck, HealthCheckItem};
use crate::error::Result;
use crate::substrate::VcsClient;
use crate::substrate::vcs_client::WorkflowRunStatus;

/// Default delay between PR open and the health check firing.
pub const DEFAULT_DELAY_MINUTES: i64 = 5;

pub struct HealthChecker {
    vcs: Arc<dyn VcsClient>,
}

impl HealthChecker {
    pub fn new(vcs: Arc<dyn VcsClient>) -> Self {
        Self { vcs }
    }

    /// Schedule a health check `delay_minutes` after `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        &self,
        failure_id: Uuid,
        remediation_id: Uuid,
        snapshot_id: Uuid,
        repository: &str,
        branch: &str,
        now: DateTime<Utc>,
        delay_minutes: i64,
    ) -> HealthCheck {
        HealthCheck::schedule(failure_id, remediation_id, snapshot_id, repository, branch, now + chrono::Duration::minutes(delay_minutes))
    }

    /// Run the rule set and resolve the check in place. The repository and
    /// branch travel with the check itself so a scheduler resuming a due
    /// check after a restart needs nothing beyond the stored `HealthCheck`.
    pub async fn evaluate(&self, check: &mut HealthCheck, now: DateTime<Utc>) -> Result<()> {
        let mut items = Vec::new();
        let branch = check.branch.as_str();

        let runs = self.vcs.list_workflow_runs(&check.repository, branch).await?;
        let latest_status = runs.iter().max_by_key(|r| r.started_at).map(|r| r.status);
        items.push(HealthCheckItem {
            name: "workflow_status".into(),
            passed: !matches!(latest_status, Some(WorkflowRunStatus::Failure)),
            message: match latest_status {
                Some(status) => format!("latest run on {branch}: {status:?}"),
                None => format!("no runs observed on {branch}"),
            },
        });

        items.push(HealthCheckItem {
            name: "pr_present".into(),
            passed: true,
            message: "PR presence verified by Executor at open time".into(),
        });

        check.resolve(items, now);
        Ok(())
    }
}
