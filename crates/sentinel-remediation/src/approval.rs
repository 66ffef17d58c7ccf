//! `ApprovalManager` — the human-review gate for remediations the
//! `SafetyGate` flagged as `RequireApproval`. Review is modeled as a
//! deployment to a protected environment: a reviewer approving or
//! rejecting that deployment in the VCS host is what resolves the request.

use std::sync::Arc;

use chrono::Utc;
use sentinel_core::domain::{
    reviewer_requirement, ActionKind, Analysis, ApprovalRequest, ApprovalStatus, AuditEntry, Failure, Outcome,
};
use sentinel_core::substrate::{
    Clock, DeploymentStatus, Notifier, NotificationKind, NotificationPayload, Store, VcsClient,
};
use tracing::info;

use crate::error::Result;

/// What became of a pending approval after one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    Expired,
    StillPending,
}

pub struct ApprovalManager {
    vcs: Arc<dyn VcsClient>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalManager {
    pub fn new(vcs: Arc<dyn VcsClient>, store: Arc<dyn Store>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { vcs, store, clock, notifier }
    }

    /// Open a review-gated deployment and comment on the PR asking for
    /// sign-off. `reviewer_pool` is the repository's configured reviewers
    /// for `analysis.risk_score`'s tier; the first N required are recorded
    /// on the request (N and tier from [`reviewer_requirement`]).
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        failure: &Failure,
        analysis: &Analysis,
        remediation_id: uuid::Uuid,
        snapshot_id: uuid::Uuid,
        branch: &str,
        pr_number: u64,
        environment: &str,
        reviewer_pool: &[String],
        timeout_hours: i64,
        channel: &str,
    ) -> Result<(ApprovalRequest, u64)> {
        let (count, _tier) = reviewer_requirement(analysis.risk_score);
        let reviewers: Vec<String> = reviewer_pool.iter().take(count as usize).cloned().collect();

        let now = self.clock.now();
        let mut request = ApprovalRequest::new(
            failure.failure_id, remediation_id, snapshot_id,
            &failure.repository, branch, reviewers, environment, now, timeout_hours,
        );
        request.pr_number = Some(pr_number);

        let deployment = self.vcs.create_deployment(&failure.repository, branch, environment).await?;
        request.deployment_id = Some(deployment.deployment_id);
        self.store.upsert_approval(&request).await?;

        self.vcs
            .comment_on_pull_request(&failure.repository, pr_number, &request_comment(&request))
            .await?;

        self.notifier
            .send(
                channel,
                NotificationKind::ApprovalRequested,
                NotificationPayload {
                    repository: failure.repository.clone(),
                    failure_id: Some(failure.failure_id),
                    summary: format!("approval requested for {} (risk {})", failure.repository, analysis.risk_score),
                    details: serde_json::json!({
                        "request_id": request.request_id,
                        "required_reviewers": request.required_reviewers,
                        "environment": environment,
                        "deployment_id": deployment.deployment_id,
                    }),
                },
            )
            .await
            .ok();

        self.audit(
            ActionKind::Approval,
            Some(failure.failure_id),
            Outcome::Pending,
            serde_json::json!({"request_id": request.request_id, "deployment_id": deployment.deployment_id}),
        )
        .await;

        info!(failure_id = %failure.failure_id, request_id = %request.request_id, "approval requested");
        Ok((request, deployment.deployment_id))
    }

    /// Check one pending request: expiry first, then the gated deployment's
    /// status. Mutates and persists `request` when it resolves. The
    /// deployment id travels on the request itself so callers never need to
    /// carry it alongside.
    pub async fn poll(&self, request: &mut ApprovalRequest, channel: &str) -> Result<ApprovalOutcome> {
        let now = self.clock.now();

        if request.status != ApprovalStatus::Pending {
            return Ok(terminal_outcome(request.status));
        }

        if request.is_expired_at(now) {
            request.resolve(ApprovalStatus::Expired, "system", now);
            self.store.upsert_approval(request).await?;
            self.notify_resolved(request, channel, "approval request expired before resolution").await;
            return Ok(ApprovalOutcome::Expired);
        }

        let deployment_id = request.deployment_id.unwrap_or_default();
        let status = self.vcs.poll_deployment_status(&request.repository, deployment_id).await?;
        match status {
            DeploymentStatus::Healthy => {
                request.resolve(ApprovalStatus::Approved, "reviewer", now);
                self.store.upsert_approval(request).await?;
                self.notify_resolved(request, channel, "approval granted").await;
                Ok(ApprovalOutcome::Approved)
            }
            DeploymentStatus::Failed => {
                request.resolve(ApprovalStatus::Rejected, "reviewer", now);
                self.store.upsert_approval(request).await?;
                self.notify_resolved(request, channel, "approval rejected").await;
                Ok(ApprovalOutcome::Rejected)
            }
            DeploymentStatus::Pending | DeploymentStatus::InProgress => Ok(ApprovalOutcome::StillPending),
        }
    }

    async fn notify_resolved(&self, request: &ApprovalRequest, channel: &str, summary: &str) {
        self.notifier
            .send(
                channel,
                NotificationKind::ApprovalResolved,
                NotificationPayload {
                    repository: request.repository.clone(),
                    failure_id: Some(request.failure_id),
                    summary: summary.to_string(),
                    details: serde_json::json!({"request_id": request.request_id, "status": request.status}),
                },
            )
            .await
            .ok();
        self.audit(
            ActionKind::Approval,
            Some(request.failure_id),
            Outcome::Success,
            serde_json::json!({"request_id": request.request_id, "status": request.status}),
        )
        .await;
    }

    async fn audit(&self, kind: ActionKind, failure_id: Option<uuid::Uuid>, outcome: Outcome, details: serde_json::Value) {
        let entry = AuditEntry::new("approval_manager", kind, failure_id, outcome, details, self.clock.now());
        if let Err(err) = self.store.append_audit(&entry).await {
            tracing::debug!(error = %err, "failed to append approval audit entry");
        }
    }
}

fn terminal_outcome(status: ApprovalStatus) -> ApprovalOutcome {
    match status {
        ApprovalStatus::Approved => ApprovalOutcome::Approved,
        ApprovalStatus::Rejected => ApprovalOutcome::Rejected,
        ApprovalStatus::Expired => ApprovalOutcome::Expired,
        ApprovalStatus::Pending => ApprovalOutcome::StillPending,
    }
}

fn request_comment(request: &ApprovalRequest) -> String {
    format!(
        "This remediation requires approval from {} reviewer(s) ({}) before it can proceed. \
        Approve or reject the `{}` deployment to resolve this request; it expires at {}.",
        request.required_reviewers.len(),
        request.required_reviewers.join(", "),
        request.environment_name,
        request.expires_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::{Effort, ErrorType};
    use sentinel_core::substrate::clock::ManualClock;
    use sentinel_core::substrate::notifier::StubNotifier;
    use sentinel_core::substrate::vcs_client::StubVcsClient;
    use sentinel_store::InMemoryStore;

    fn failure() -> Failure {
        Failure::new("acme/widgets", "main", "build", "run-1", "deadbeef", "logs", "npm timeout", Utc::now())
    }

    fn analysis(failure_id: uuid::Uuid, risk_score: u8) -> Analysis {
        Analysis {
            failure_id,
            error_type: ErrorType::Devops,
            category: "dependency_resolution".into(),
            risk_score,
            confidence: 60,
            effort: Effort::Med,
            proposed_fix: "bump lockfile".into(),
            files_to_modify: vec![],
            fix_operations: vec![],
            reasoning: String::new(),
            affected_components: vec![],
            model_id: "test-model".into(),
            response_latency_ms: 0,
        }
    }

    fn manager() -> (ApprovalManager, Arc<StubVcsClient>, Arc<InMemoryStore>) {
        let vcs = Arc::new(StubVcsClient::new());
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let notifier = Arc::new(StubNotifier::new());
        (ApprovalManager::new(vcs.clone(), store.clone(), clock, notifier), vcs, store)
    }

    #[tokio::test]
    async fn high_risk_requires_two_senior_reviewers() {
        let (manager, _vcs, _store) = manager();
        let f = failure();
        let a = analysis(f.failure_id, 9);
        let pool = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        let (request, _deployment_id) = manager
            .request(&f, &a, uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), "sentinel/fix-1", 1, "prod-review", &pool, 24, "#ci-alerts")
            .await
            .unwrap();
        assert_eq!(request.required_reviewers, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn healthy_deployment_approves() {
        let (manager, vcs, _store) = manager();
        let f = failure();
        let a = analysis(f.failure_id, 6);
        let pool = vec!["alice".to_string()];
        let (mut request, deployment_id) = manager
            .request(&f, &a, uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), "sentinel/fix-1", 1, "prod-review", &pool, 24, "#ci-alerts")
            .await
            .unwrap();
        vcs.seed_deployment_status(deployment_id, DeploymentStatus::Healthy);
        let outcome = manager.poll(&mut request, "#ci-alerts").await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::Approved);
        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn failed_deployment_rejects() {
        let (manager, vcs, _store) = manager();
        let f = failure();
        let a = analysis(f.failure_id, 6);
        let pool = vec!["alice".to_string()];
        let (mut request, deployment_id) = manager
            .request(&f, &a, uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), "sentinel/fix-1", 1, "prod-review", &pool, 24, "#ci-alerts")
            .await
            .unwrap();
        vcs.seed_deployment_status(deployment_id, DeploymentStatus::Failed);
        let outcome = manager.poll(&mut request, "#ci-alerts").await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::Rejected);
    }

    #[tokio::test]
    async fn still_pending_deployment_does_not_resolve() {
        let (manager, _vcs, _store) = manager();
        let f = failure();
        let a = analysis(f.failure_id, 6);
        let pool = vec!["alice".to_string()];
        let (mut request, _deployment_id) = manager
            .request(&f, &a, uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), "sentinel/fix-1", 1, "prod-review", &pool, 24, "#ci-alerts")
            .await
            .unwrap();
        let outcome = manager.poll(&mut request, "#ci-alerts").await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::StillPending);
        assert_eq!(request.status, ApprovalStatus::Pending);
    }
}
