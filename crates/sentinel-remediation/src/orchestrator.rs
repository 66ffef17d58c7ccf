//! `Orchestrator` — drives one repository's `Failure`s through the full
//! control-loop state machine end to end: `detected -> analyzed -> gated ->
//! pr_open -> remediated|rolled_back|failed`, escalating to developer
//! notification or blocking outright when the circuit breaker or blast
//! radius demands it. One instance owns exactly one repository; the
//! internal mutex serializes that repository's remediations against each
//! other, while the externally-injected semaphore bounds how many
//! repositories' remediations run at once across the fleet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sentinel_core::domain::{
    ActionKind, Alternative, Analysis, ApprovalRequest, AuditEntry, CircuitState, DecisionKind,
    DecisionRecord, EmbeddingFamily, Failure, FailureStatus, HealthCheck, Outcome, Pattern, PersonalityProfile,
    Snapshot,
};
use sentinel_core::substrate::{Clock, Notifier, NotificationKind, NotificationPayload, Store, VcsClient};
use sentinel_core::{
    admit, assess_blast_radius, evaluate_gate, hashed_token_embedding, normalize_reason, record_failure,
    record_success, signature_for, Admission, BlastRadiusInput, GateConfig, HealthChecker, PatternMemory, Verdict,
};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::approval::{ApprovalManager, ApprovalOutcome};
use crate::classifier::Classifier;
use crate::error::{RemediationError, Result};
use crate::executor::{ExecutionOutcome, ExecutionRequest, Executor};

const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);
const VCS_TIMEOUT: Duration = Duration::from_secs(20);
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-repository policy the Orchestrator applies to every Failure it
/// processes. One of these per configured repository.
pub struct OrchestratorConfig {
    pub repository: String,
    pub default_branch: String,
    pub protected: bool,
    pub application_globs: Vec<String>,
    pub dry_run: bool,
    pub risk_threshold: u8,
    pub circuit_failure_threshold: u32,
    pub circuit_auto_reset_hours: i64,
    pub approval_timeout_hours: i64,
    pub approval_environment: String,
    pub reviewer_pool: Vec<String>,
    pub snapshot_retention_days: i64,
    pub health_check_delay_minutes: i64,
    pub notify_channel: String,
}

/// What the Orchestrator did with one Failure, or one resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    AutoApplied { remediation_id: Uuid, pr_number: u64 },
    Simulated { remediation_id: Uuid },
    AwaitingApproval { request_id: Uuid, remediation_id: Uuid },
    Remediated { remediation_id: Uuid },
    RolledBack { remediation_id: Uuid, reason: String },
    Blocked { reason: String },
    DeveloperNotified { reason: String },
    Failed { reason: String },
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    classifier: Classifier,
    executor: Executor,
    approval: ApprovalManager,
    health: HealthChecker,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    patterns: Arc<PatternMemory>,
    repo_lock: Mutex<()>,
    fleet_limit: Arc<Semaphore>,
    cancellation: CancellationToken,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        classifier: Classifier,
        executor: Executor,
        approval: ApprovalManager,
        vcs: Arc<dyn VcsClient>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        patterns: Arc<PatternMemory>,
        fleet_limit: Arc<Semaphore>,
        cancellation: CancellationToken,
    ) -> Self {
        let health = HealthChecker::new(vcs);
        Self {
            config,
            classifier,
            executor,
            approval,
            health,
            store,
            clock,
            notifier,
            patterns,
            repo_lock: Mutex::new(()),
            fleet_limit,
            cancellation,
        }
    }

    /// Drive one newly detected `Failure` from `Detected` through
    /// `Analyzed` and `Gated` to whichever terminal-for-now state the gate
    /// verdict implies. `Remediated`/`RolledBack` for an approved or
    /// auto-applied fix are only reached later, via [`Self::resolve_approval`]
    /// or [`Self::resolve_health_check`].
    pub async fn process_failure(&self, mut failure: Failure) -> Result<RemediationOutcome> {
        let _repo_guard = self.repo_lock.lock().await;
        let _permit = self.fleet_limit.acquire().await.map_err(|_| RemediationError::Cancelled)?;
        if self.cancellation.is_cancelled() {
            return Err(RemediationError::Cancelled);
        }

        let now = self.clock.now();

        let personality = self.personality().await?;
        let (analysis, classify_decision) = tokio::time::timeout(CLASSIFY_TIMEOUT, self.classifier.classify(&failure, &personality))
            .await
            .map_err(|_| RemediationError::Timeout(CLASSIFY_TIMEOUT))??;
        self.store.upsert_decision(&classify_decision).await?;
        self.mark(&mut failure, FailureStatus::Analyzed).await?;
        self.audit(
            ActionKind::Classify,
            Some(failure.failure_id),
            Outcome::Success,
            serde_json::json!({"category": analysis.category, "risk_score": analysis.risk_score}),
            now,
        )
        .await;

        let signature = signature_for(&failure.repository, &failure.branch, &failure.failure_reason);
        let mut circuit = self.store.get_circuit(&signature).await?.unwrap_or_else(|| CircuitState::new(signature.clone()));
        let admission = admit(&mut circuit, now);

        let blast = assess_blast_radius(&BlastRadiusInput {
            branch: &failure.branch,
            default_branch: &self.config.default_branch,
            files_to_modify: &analysis.files_to_modify,
            failure_category: &analysis.category,
        });

        let gate_config = GateConfig {
            risk_threshold: self.config.risk_threshold,
            protected: self.config.protected,
            application_globs: &self.config.application_globs,
            dry_run: self.config.dry_run,
        };
        let gate_result = evaluate_gate(&analysis, &analysis.files_to_modify, admission, &blast, &gate_config);
        self.store.upsert_circuit(&circuit).await?;

        let gate_decision = DecisionRecord::new(
            failure.failure_id,
            DecisionKind::RiskAssessment,
            format!("{:?}", gate_result.verdict),
            gate_result
                .outcomes
                .iter()
                .map(|o| Alternative {
                    option: o.gate.clone(),
                    score: if o.passed { 1.0 } else { 0.0 },
                    rejection_reason: o.reason.clone().unwrap_or_default(),
                })
                .collect(),
            signature.as_str().to_string(),
            analysis.confidence,
            now,
        );
        self.store.upsert_decision(&gate_decision).await?;

        self.mark(&mut failure, FailureStatus::Gated).await?;
        self.audit(
            ActionKind::Gate,
            Some(failure.failure_id),
            Outcome::Success,
            serde_json::json!({"verdict": gate_result.verdict, "blast_score": blast.score}),
            now,
        )
        .await;

        match gate_result.verdict {
            Verdict::Block if admission == Admission::Deny => {
                self.developer_notify(&mut failure, "circuit breaker open for this failure signature").await
            }
            Verdict::Block => {
                self.block(&mut failure, format!("blast radius {:.1} at or above block threshold", blast.score)).await
            }
            Verdict::RequireApproval => self.execute_and_finish(&mut failure, &analysis, &mut circuit, true).await,
            Verdict::AutoApply | Verdict::AutoApplySimulated => {
                self.execute_and_finish(&mut failure, &analysis, &mut circuit, false).await
            }
        }
    }

    /// Resolve one pending `ApprovalRequest`: approved merges to
    /// `Remediated`, rejected or expired rolls back to `RolledBack`. A
    /// still-pending poll leaves everything untouched. Everything needed to
    /// act travels on `request` itself (`failure_id`, `remediation_id`,
    /// `snapshot_id`, `branch`, `deployment_id`), so a scheduler can call
    /// this with nothing more than what `Store::pending_approvals` returns.
    pub async fn resolve_approval(&self, mut request: ApprovalRequest) -> Result<RemediationOutcome> {
        let _permit = self.fleet_limit.acquire().await.map_err(|_| RemediationError::Cancelled)?;
        if self.cancellation.is_cancelled() {
            return Err(RemediationError::Cancelled);
        }

        let outcome = tokio::time::timeout(VCS_TIMEOUT, self.approval.poll(&mut request, &self.config.notify_channel))
            .await
            .map_err(|_| RemediationError::Timeout(VCS_TIMEOUT))??;

        let remediation_id = request.remediation_id;
        if matches!(outcome, ApprovalOutcome::StillPending) {
            return Ok(RemediationOutcome::AwaitingApproval { request_id: request.request_id, remediation_id });
        }

        let mut failure = self
            .store
            .get_failure(request.failure_id)
            .await?
            .ok_or_else(|| RemediationError::Core(sentinel_core::CoreError::FailureNotFound(request.failure_id)))?;
        let now = self.clock.now();
        let signature = signature_for(&failure.repository, &failure.branch, &failure.failure_reason);
        let mut circuit = self.store.get_circuit(&signature).await?.unwrap_or_else(|| CircuitState::new(signature));

        match outcome {
            ApprovalOutcome::Approved => {
                record_success(&mut circuit, now);
                self.store.upsert_circuit(&circuit).await?;
                self.mark(&mut failure, FailureStatus::Remediated).await?;
                if let Some(snapshot) = self.store.get_snapshot(request.snapshot_id).await? {
                    self.record_pattern(&failure, &snapshot, true, now).await;
                }
                Ok(RemediationOutcome::Remediated { remediation_id })
            }
            ApprovalOutcome::Rejected | ApprovalOutcome::Expired => {
                let snapshot = self
                    .store
                    .get_snapshot(request.snapshot_id)
                    .await?
                    .ok_or_else(|| RemediationError::Core(sentinel_core::CoreError::Storage("snapshot not found for approval request".into())))?;
                self.executor
                    .rollback(&failure.repository, &request.branch, &snapshot, failure.failure_id, &self.config.notify_channel)
                    .await?;
                record_failure(&mut circuit, now, self.config.circuit_failure_threshold, chrono::Duration::hours(self.config.circuit_auto_reset_hours));
                self.store.upsert_circuit(&circuit).await?;
                self.mark(&mut failure, FailureStatus::RolledBack).await?;
                self.record_pattern(&failure, &snapshot, false, now).await;
                let reason = if matches!(outcome, ApprovalOutcome::Expired) {
                    "approval request expired before resolution"
                } else {
                    "approval rejected by reviewer"
                };
                Ok(RemediationOutcome::RolledBack { remediation_id, reason: reason.to_string() })
            }
            ApprovalOutcome::StillPending => unreachable!("handled above"),
        }
    }

    /// Evaluate one due `HealthCheck`. A failing check rolls back; a
    /// passing one confirms the remediation. `check` alone is enough: the
    /// repository and branch it evaluates travel with it, and `failure_id`/
    /// `snapshot_id` let this method pull the rest from the store.
    pub async fn resolve_health_check(&self, mut check: HealthCheck) -> Result<RemediationOutcome> {
        let _permit = self.fleet_limit.acquire().await.map_err(|_| RemediationError::Cancelled)?;
        if self.cancellation.is_cancelled() {
            return Err(RemediationError::Cancelled);
        }

        let now = self.clock.now();
        tokio::time::timeout(VCS_TIMEOUT, self.health.evaluate(&mut check, now))
            .await
            .map_err(|_| RemediationError::Timeout(VCS_TIMEOUT))??;
        self.store.upsert_health_check(&check).await?;

        let mut failure = self
            .store
            .get_failure(check.failure_id)
            .await?
            .ok_or_else(|| RemediationError::Core(sentinel_core::CoreError::FailureNotFound(check.failure_id)))?;
        let signature = signature_for(&failure.repository, &failure.branch, &failure.failure_reason);
        let mut circuit = self.store.get_circuit(&signature).await?.unwrap_or_else(|| CircuitState::new(signature));

        self.audit(
            ActionKind::HealthCheck,
            Some(failure.failure_id),
            if check.triggered_rollback { Outcome::Failure } else { Outcome::Success },
            serde_json::json!({"check_id": check.check_id}),
            now,
        )
        .await;

        if check.triggered_rollback {
            let snapshot = self
                .store
                .get_snapshot(check.snapshot_id)
                .await?
                .ok_or_else(|| RemediationError::Core(sentinel_core::CoreError::Storage("snapshot not found for health check".into())))?;
            self.executor
                .rollback(&failure.repository, &check.branch, &snapshot, failure.failure_id, &self.config.notify_channel)
                .await?;
            record_failure(&mut circuit, now, self.config.circuit_failure_threshold, chrono::Duration::hours(self.config.circuit_auto_reset_hours));
            self.store.upsert_circuit(&circuit).await?;
            self.mark(&mut failure, FailureStatus::RolledBack).await?;
            self.record_pattern(&failure, &snapshot, false, now).await;
            Ok(RemediationOutcome::RolledBack { remediation_id: check.remediation_id, reason: "post-merge health check failed".into() })
        } else {
            record_success(&mut circuit, now);
            self.store.upsert_circuit(&circuit).await?;
            self.mark(&mut failure, FailureStatus::Remediated).await?;
            if let Some(snapshot) = self.store.get_snapshot(check.snapshot_id).await? {
                self.record_pattern(&failure, &snapshot, true, now).await;
            }
            Ok(RemediationOutcome::Remediated { remediation_id: check.remediation_id })
        }
    }

    /// Record a `Pattern` for this failure's resolution, successful or not,
    /// so a future classification of a similar failure can recall it.
    /// Storage failures are logged and swallowed: pattern memory is a
    /// recall aid, not part of the remediation's correctness.
    async fn record_pattern(&self, failure: &Failure, snapshot: &Snapshot, fix_successful: bool, now: DateTime<Utc>) {
        let normalized_reason = normalize_reason(&failure.failure_reason);
        let embedding = hashed_token_embedding(&normalized_reason);
        let pattern = Pattern::new(
            failure.repository.clone(),
            failure.branch.clone(),
            normalized_reason,
            snapshot.category.clone(),
            snapshot.proposed_fix.clone(),
            snapshot.files.iter().map(|f| f.path.clone()).collect(),
            Vec::new(),
            fix_successful,
            now.signed_duration_since(failure.detected_at).num_milliseconds().max(0) as u64,
            embedding,
            EmbeddingFamily::HashedToken,
            now,
        );
        if let Err(err) = self.store.upsert_pattern(&pattern).await {
            warn!(failure_id = %failure.failure_id, error = %err, "failed to persist remediation pattern");
        }
        self.patterns.insert(pattern);
    }

    async fn execute_and_finish(&self, failure: &mut Failure, analysis: &Analysis, circuit: &mut CircuitState, requires_approval: bool) -> Result<RemediationOutcome> {
        let req = ExecutionRequest {
            failure,
            analysis,
            dry_run: self.config.dry_run,
            snapshot_retention_days: self.config.snapshot_retention_days,
            health_check_delay_minutes: self.config.health_check_delay_minutes,
        };
        let outcome = tokio::time::timeout(VCS_TIMEOUT, self.executor.execute(req))
            .await
            .map_err(|_| RemediationError::Timeout(VCS_TIMEOUT))?;

        match outcome {
            Ok(ExecutionOutcome::Simulated { remediation_id, .. }) => {
                self.mark(failure, FailureStatus::Remediated).await?;
                Ok(RemediationOutcome::Simulated { remediation_id })
            }
            Ok(ExecutionOutcome::Applied { remediation_id, branch, pr, snapshot_id, .. }) if requires_approval => {
                self.mark(failure, FailureStatus::PrOpen).await?;
                let (request, deployment_id) = tokio::time::timeout(
                    VCS_TIMEOUT,
                    self.approval.request(
                        failure,
                        analysis,
                        remediation_id,
                        snapshot_id,
                        &branch,
                        pr.number,
                        &self.config.approval_environment,
                        &self.config.reviewer_pool,
                        self.config.approval_timeout_hours,
                        &self.config.notify_channel,
                    ),
                )
                .await
                .map_err(|_| RemediationError::Timeout(VCS_TIMEOUT))??;
                let _ = deployment_id;
                Ok(RemediationOutcome::AwaitingApproval { request_id: request.request_id, remediation_id })
            }
            Ok(ExecutionOutcome::Applied { remediation_id, pr, .. }) => {
                self.mark(failure, FailureStatus::PrOpen).await?;
                Ok(RemediationOutcome::AutoApplied { remediation_id, pr_number: pr.number })
            }
            Err(err) => self.fail(failure, circuit, err.to_string()).await,
        }
    }

    async fn personality(&self) -> Result<PersonalityProfile> {
        let now = self.clock.now();
        Ok(self
            .store
            .get_personality(&self.config.repository)
            .await?
            .unwrap_or_else(|| PersonalityProfile::empty(&self.config.repository, now)))
    }

    async fn mark(&self, failure: &mut Failure, status: FailureStatus) -> Result<()> {
        failure.status = status;
        self.store.upsert_failure(failure).await?;
        Ok(())
    }

    async fn developer_notify(&self, failure: &mut Failure, reason: &str) -> Result<RemediationOutcome> {
        self.mark(failure, FailureStatus::DeveloperNotified).await?;
        self.notify(failure, NotificationKind::DeveloperEscalation, format!("developer notified: {reason}"), serde_json::json!({"reason": reason}))
            .await;
        self.audit(ActionKind::Notify, Some(failure.failure_id), Outcome::Success, serde_json::json!({"reason": reason}), self.clock.now())
            .await;
        Ok(RemediationOutcome::DeveloperNotified { reason: reason.to_string() })
    }

    async fn block(&self, failure: &mut Failure, reason: String) -> Result<RemediationOutcome> {
        self.mark(failure, FailureStatus::Failed).await?;
        self.notify(failure, NotificationKind::RemediationFailed, format!("blocked: {reason}"), serde_json::json!({"reason": reason}))
            .await;
        self.audit(ActionKind::Gate, Some(failure.failure_id), Outcome::Failure, serde_json::json!({"reason": reason}), self.clock.now())
            .await;
        Ok(RemediationOutcome::Blocked { reason })
    }

    async fn fail(&self, failure: &mut Failure, circuit: &mut CircuitState, reason: String) -> Result<RemediationOutcome> {
        let now = self.clock.now();
        record_failure(circuit, now, self.config.circuit_failure_threshold, chrono::Duration::hours(self.config.circuit_auto_reset_hours));
        if let Err(err) = self.store.upsert_circuit(circuit).await {
            warn!(error = %err, "failed to persist circuit state after remediation failure");
        }
        self.mark(failure, FailureStatus::Failed).await?;
        self.notify(failure, NotificationKind::RemediationFailed, format!("remediation failed: {reason}"), serde_json::json!({"reason": reason}))
            .await;
        self.audit(ActionKind::Classify, Some(failure.failure_id), Outcome::Failure, serde_json::json!({"reason": reason}), now)
            .await;
        Ok(RemediationOutcome::Failed { reason })
    }

    async fn notify(&self, failure: &Failure, kind: NotificationKind, summary: impl Into<String>, details: serde_json::Value) {
        let result = tokio::time::timeout(
            NOTIFY_TIMEOUT,
            self.notifier.send(
                &self.config.notify_channel,
                kind,
                NotificationPayload {
                    repository: failure.repository.clone(),
                    failure_id: Some(failure.failure_id),
                    summary: summary.into(),
                    details,
                },
            ),
        )
        .await;
        if let Err(err) = result {
            warn!(error = %err, "notification timed out");
        }
    }

    async fn audit(&self, kind: ActionKind, failure_id: Option<Uuid>, outcome: Outcome, details: serde_json::Value, now: DateTime<Utc>) {
        let entry = AuditEntry::new("orchestrator", kind, failure_id, outcome, details, now);
        if let Err(err) = self.store.append_audit(&entry).await {
            tracing::debug!(error = %err, "failed to append orchestrator audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_core::domain::FailureStatus;
    use sentinel_core::substrate::clock::ManualClock;
    use sentinel_core::substrate::notifier::StubNotifier;
    use sentinel_core::substrate::vcs_client::{DeploymentStatus, StubVcsClient};
    use sentinel_core::substrate::model_client::StubModelClient;
    use sentinel_core::PatternMemory;
    use sentinel_store::InMemoryStore;

    fn config(repository: &str) -> OrchestratorConfig {
        OrchestratorConfig {
            repository: repository.to_string(),
            default_branch: "main".to_string(),
            protected: false,
            application_globs: vec![],
            dry_run: false,
            risk_threshold: 5,
            circuit_failure_threshold: 3,
            circuit_auto_reset_hours: 24,
            approval_timeout_hours: 24,
            approval_environment: "prod-review".to_string(),
            reviewer_pool: vec!["alice".to_string(), "bob".to_string()],
            snapshot_retention_days: 7,
            health_check_delay_minutes: 5,
            notify_channel: "#ci-alerts".to_string(),
        }
    }

    fn orchestrator(content: &str) -> (Orchestrator, Arc<StubVcsClient>, Arc<InMemoryStore>) {
        let vcs = Arc::new(StubVcsClient::new());
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let notifier = Arc::new(StubNotifier::new());
        let model = Arc::new(StubModelClient::with_content(content));
        let patterns = Arc::new(PatternMemory::new());
        let classifier = Classifier::new(model, patterns.clone(), "test-model");
        let executor = Executor::new(vcs.clone(), store.clone(), clock.clone(), notifier.clone());
        let approval = ApprovalManager::new(vcs.clone(), store.clone(), clock.clone(), notifier.clone());
        let fleet_limit = Arc::new(Semaphore::new(4));
        let orchestrator = Orchestrator::new(
            config("acme/widgets"),
            classifier,
            executor,
            approval,
            vcs.clone(),
            store.clone(),
            clock,
            notifier,
            patterns,
            fleet_limit,
            CancellationToken::new(),
        );
        (orchestrator, vcs, store)
    }

    fn failure() -> Failure {
        Failure::new("acme/widgets", "main", "build", "run-1", "deadbeef", "log tail", "npm install timeout", Utc::now())
    }

    fn low_risk_json() -> &'static str {
        r#"{"error_type":"devops","category":"flaky_test","risk_score":1,"confidence":90,
        "effort":"low","proposed_fix":"retry flaky test","files_to_modify":["tests/flaky.rs"],
        "fix_operations":[{"path":"tests/flaky.rs","description":"retry","new_content":"fn x() {}"}],
        "reasoning":"known flaky test","affected_components":[]}"#
    }

    fn high_risk_json() -> &'static str {
        r#"{"error_type":"devops","category":"infrastructure","risk_score":9,"confidence":70,
        "effort":"high","proposed_fix":"rewrite deploy pipeline","files_to_modify":["deploy/pipeline.yml"],
        "fix_operations":[{"path":"deploy/pipeline.yml","description":"fix","new_content":"steps: []"}],
        "reasoning":"deploy script broken","affected_components":[]}"#
    }

    #[tokio::test]
    async fn low_risk_failure_auto_applies_and_opens_pr() {
        let (orchestrator, vcs, _store) = orchestrator(low_risk_json());
        let outcome = orchestrator.process_failure(failure()).await.unwrap();
        assert!(matches!(outcome, RemediationOutcome::AutoApplied { .. }));
        assert_eq!(vcs.opened_prs().len(), 1);
    }

    #[tokio::test]
    async fn high_risk_failure_opens_pr_and_awaits_approval() {
        let (orchestrator, vcs, _store) = orchestrator(high_risk_json());
        let outcome = orchestrator.process_failure(failure()).await.unwrap();
        assert!(matches!(outcome, RemediationOutcome::AwaitingApproval { .. }));
        assert_eq!(vcs.opened_prs().len(), 1);
    }

    #[tokio::test]
    async fn approval_rejection_rolls_back() {
        let (orchestrator, vcs, store) = orchestrator(high_risk_json());
        let f = failure();
        let outcome = orchestrator.process_failure(f.clone()).await.unwrap();
        let RemediationOutcome::AwaitingApproval { request_id, .. } = outcome else {
            panic!("expected awaiting approval");
        };
        let request = store.get_approval(request_id).await.unwrap().unwrap();
        let _ = vcs.opened_prs().into_iter().next().unwrap();
        vcs.seed_deployment_status(request.deployment_id.unwrap(), DeploymentStatus::Failed);

        let resolved = orchestrator.resolve_approval(request).await.unwrap();
        assert!(matches!(resolved, RemediationOutcome::RolledBack { .. }));
        let final_failure = store.get_failure(f.failure_id).await.unwrap().unwrap();
        assert_eq!(final_failure.status, FailureStatus::RolledBack);
    }
}
