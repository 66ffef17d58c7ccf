//! `Executor` — applies an `Analysis`'s proposed fix: snapshots the files
//! about to change, branches off the *failing* branch, writes the edit,
//! opens a PR back onto that same branch, and schedules the post-merge
//! health check. Every state-changing call is intercepted and logged
//! instead of invoked when running in dry-run mode.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentinel_core::domain::{ActionKind, Analysis, AuditEntry, Failure, Outcome, Snapshot};
use sentinel_core::substrate::{Clock, FileWrite, Notifier, NotificationKind, NotificationPayload, PullRequest, Store, VcsClient};
use sentinel_core::{HealthChecker, RollbackReport, SnapshotManager};
use tracing::info;
use uuid::Uuid;

use crate::error::{RemediationError, Result};

/// Parameters for one execution attempt; one `Failure`/`Analysis` pair ever
/// maps to at most one remediation branch.
pub struct ExecutionRequest<'a> {
    pub failure: &'a Failure,
    pub analysis: &'a Analysis,
    pub dry_run: bool,
    pub snapshot_retention_days: i64,
    pub health_check_delay_minutes: i64,
}

/// What the Executor actually did.
pub enum ExecutionOutcome {
    /// A real branch, edit, and PR were created; a health check is now
    /// pending `health_check_delay_minutes` out.
    Applied {
        remediation_id: Uuid,
        branch: String,
        pr: PullRequest,
        snapshot_id: Uuid,
        health_check_id: Uuid,
    },
    /// Dry run: nothing was written anywhere. `digest` is a short hash of
    /// the actions that would have been taken, for comparing repeated runs.
    Simulated { remediation_id: Uuid, branch: String, digest: String },
}

pub struct Executor {
    vcs: Arc<dyn VcsClient>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    snapshots: SnapshotManager,
    health: HealthChecker,
}

impl Executor {
    pub fn new(vcs: Arc<dyn VcsClient>, store: Arc<dyn Store>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        let snapshots = SnapshotManager::new(store.clone(), vcs.clone());
        let health = HealthChecker::new(vcs.clone());
        Self {
            vcs,
            store,
            clock,
            notifier,
            snapshots,
            health,
        }
    }

    /// Apply (or simulate) `req`'s proposed fix.
    pub async fn execute(&self, req: ExecutionRequest<'_>) -> Result<ExecutionOutcome> {
        let remediation_id = Uuid::new_v4();
        let branch = remediation_branch_name(remediation_id);
        let writes = writes_for(req.analysis);

        if req.dry_run {
            return Ok(self.simulate(req, remediation_id, branch, &writes).await);
        }

        let now = self.clock.now();

        let mut snapshot = self
            .snapshots
            .capture(
                &req.failure.repository,
                remediation_id,
                &req.failure.branch,
                &req.failure.commit_hash,
                &req.analysis.files_to_modify,
                &req.analysis.category,
                &req.analysis.proposed_fix,
                now,
                req.snapshot_retention_days,
            )
            .await
            .map_err(|err| RemediationError::SnapshotFailed(err.to_string()))?;
        self.audit(
            ActionKind::Snapshot,
            Some(req.failure.failure_id),
            Outcome::Success,
            serde_json::json!({"snapshot_id": snapshot.snapshot_id, "files": req.analysis.files_to_modify}),
            now,
        )
        .await;

        self.vcs.create_branch(&req.failure.repository, &branch, &req.failure.branch).await?;
        self.audit(
            ActionKind::BranchCreate,
            Some(req.failure.failure_id),
            Outcome::Success,
            serde_json::json!({"branch": branch, "from": req.failure.branch}),
            now,
        )
        .await;

        self.vcs.write_files(&req.failure.repository, &branch, &writes).await?;
        self.snapshots.record_post_edit(&mut snapshot, &writes).await?;
        self.audit(
            ActionKind::FileEdit,
            Some(req.failure.failure_id),
            Outcome::Success,
            serde_json::json!({"branch": branch, "files": writes.iter().map(|w| &w.path).collect::<Vec<_>>()}),
            now,
        )
        .await;

        let pr = self
            .vcs
            .open_pull_request(
                &req.failure.repository,
                &branch,
                &req.failure.branch,
                &pr_title(req.analysis),
                &pr_body(req.failure, req.analysis),
            )
            .await?;
        self.audit(
            ActionKind::PrOpen,
            Some(req.failure.failure_id),
            Outcome::Success,
            serde_json::json!({"pr_number": pr.number, "url": pr.url}),
            now,
        )
        .await;

        let health_check = self.health.schedule(
            req.failure.failure_id,
            remediation_id,
            snapshot.snapshot_id,
            &req.failure.repository,
            &branch,
            now,
            req.health_check_delay_minutes,
        );
        self.store.upsert_health_check(&health_check).await?;
        self.audit(
            ActionKind::HealthCheck,
            Some(req.failure.failure_id),
            Outcome::Pending,
            serde_json::json!({"check_id": health_check.check_id, "scheduled_at": health_check.scheduled_at}),
            now,
        )
        .await;

        info!(
            failure_id = %req.failure.failure_id,
            remediation_id = %remediation_id,
            branch = %branch,
            pr_number = pr.number,
            "remediation applied"
        );

        Ok(ExecutionOutcome::Applied {
            remediation_id,
            branch,
            pr,
            snapshot_id: snapshot.snapshot_id,
            health_check_id: health_check.check_id,
        })
    }

    async fn simulate(
        &self,
        req: ExecutionRequest<'_>,
        remediation_id: Uuid,
        branch: String,
        writes: &[FileWrite],
    ) -> ExecutionOutcome {
        let digest = dry_run_digest(&branch, req.failure, req.analysis, writes);
        info!(
            failure_id = %req.failure.failure_id,
            remediation_id = %remediation_id,
            branch = %branch,
            digest = %digest,
            "dry run: remediation simulated, no state-changing call was made"
        );
        self.audit(
            ActionKind::FileEdit,
            Some(req.failure.failure_id),
            Outcome::Success,
            serde_json::json!({
                "dry_run": true,
                "branch": branch,
                "files": writes.iter().map(|w| &w.path).collect::<Vec<_>>(),
                "digest": digest,
            }),
            self.clock.now(),
        )
        .await;
        ExecutionOutcome::Simulated { remediation_id, branch, digest }
    }

    /// Revert a remediation's files, notify, and record the outcome. Called
    /// by the Orchestrator when a `HealthCheck` fails.
    pub async fn rollback(&self, repository: &str, branch: &str, snapshot: &Snapshot, failure_id: Uuid, channel: &str) -> Result<RollbackReport> {
        let report = self.snapshots.rollback(repository, branch, snapshot).await?;
        let now = self.clock.now();

        self.notifier
            .send(
                channel,
                NotificationKind::RollbackFired,
                NotificationPayload {
                    repository: repository.to_string(),
                    failure_id: Some(failure_id),
                    summary: format!("rollback fired for {repository} on {branch}"),
                    details: serde_json::to_value(&report).unwrap_or_default(),
                },
            )
            .await
            .ok();

        let outcome = if report.partial { Outcome::Failure } else { Outcome::Success };
        self.audit(
            ActionKind::Rollback,
            Some(failure_id),
            outcome,
            serde_json::to_value(&report).unwrap_or_default(),
            now,
        )
        .await;

        Ok(report)
    }

    async fn audit(&self, kind: ActionKind, failure_id: Option<Uuid>, outcome: Outcome, details: serde_json::Value, now: DateTime<Utc>) {
        let entry = AuditEntry::new("executor", kind, failure_id, outcome, details, now);
        if let Err(err) = self.store.append_audit(&entry).await {
            tracing::debug!(error = %err, "failed to append executor audit entry");
        }
    }
}

/// Deterministic from `remediation_id` alone, so a branch can be
/// recomputed after a restart without persisting it separately.
pub fn remediation_branch_name(remediation_id: Uuid) -> String {
    format!("sentinel/fix-{}", &remediation_id.simple().to_string()[..12])
}

fn writes_for(analysis: &Analysis) -> Vec<FileWrite> {
    analysis
        .fix_operations
        .iter()
        .filter_map(|op| op.new_content.as_ref().map(|content| FileWrite {
            path: op.path.clone(),
            content: content.clone().into_bytes(),
        }))
        .collect()
}

fn pr_title(analysis: &Analysis) -> String {
    format!("sentinel: {}", analysis.proposed_fix)
}

fn pr_body(failure: &Failure, analysis: &Analysis) -> String {
    format!(
        "Automated remediation for failing workflow `{}` on `{}`.\n\n\
        **Category:** {}\n**Risk score:** {}/10\n**Confidence:** {}%\n\n\
        **Reasoning:**\n{}\n\n**Files touched:** {}\n\n_model: {}_",
        failure.workflow_name,
        failure.branch,
        analysis.category,
        analysis.risk_score,
        analysis.confidence,
        analysis.reasoning,
        analysis.files_to_modify.join(", "),
        analysis.model_id,
    )
}

fn dry_run_digest(branch: &str, failure: &Failure, analysis: &Analysis, writes: &[FileWrite]) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(branch.as_bytes());
    hasher.update(failure.failure_id.as_bytes());
    hasher.update(analysis.proposed_fix.as_bytes());
    for write in writes {
        hasher.update(write.path.as_bytes());
        hasher.update(&write.content);
    }
    hex::encode(hasher.finalize())[..16].to_string()
}
