//! `Failure` — a detected CI run failure — and its AI `Analysis`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a detected failure.
///
/// Terminal states are `Remediated`, `RolledBack`, `Failed`, and
/// `DeveloperNotified`. See [`crate::domain::audit`] for the corresponding
/// audit trail and `sentinel-remediation`'s `Orchestrator` for the state
/// machine that drives these transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    Detected,
    Analyzed,
    Gated,
    PrOpen,
    Remediated,
    RolledBack,
    Failed,
    DeveloperNotified,
}

impl FailureStatus {
    /// Whether this status is a terminal state for the Failure's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Remediated | Self::RolledBack | Self::Failed | Self::DeveloperNotified
        )
    }
}

/// A failed CI workflow run observed by the Poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub failure_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub workflow_name: String,
    pub workflow_run_id: String,
    pub commit_hash: String,
    pub status: FailureStatus,
    /// Bounded tail of the failing run's logs (see Poller §4.1 truncation rule).
    pub captured_logs: String,
    /// The extracted failure reason (first matching heuristic line, or last
    /// N log lines joined).
    pub failure_reason: String,
    pub detected_at: DateTime<Utc>,
}

impl Failure {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        workflow_name: impl Into<String>,
        workflow_run_id: impl Into<String>,
        commit_hash: impl Into<String>,
        captured_logs: impl Into<String>,
        failure_reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            failure_id: Uuid::new_v4(),
            repository: repository.into(),
            branch: branch.into(),
            workflow_name: workflow_name.into(),
            workflow_run_id: workflow_run_id.into(),
            commit_hash: commit_hash.into(),
            status: FailureStatus::Detected,
            captured_logs: captured_logs.into(),
            failure_reason: failure_reason.into(),
            detected_at: now,
        }
    }

    /// The dedupe key used by the Poller to guarantee idempotent polling
    /// (spec property: processing the same run twice never creates a
    /// duplicate record).
    pub fn dedupe_key(&self) -> (String, String) {
        (self.repository.clone(), self.workflow_run_id.clone())
    }
}

/// Coarse classification of a failure's origin, returned by the Classifier's
/// LLM call. Never re-derived heuristically by the Classifier itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Devops,
    Developer,
}

/// Estimated effort to apply the proposed fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Med,
    High,
}

/// A single proposed edit operation against a file in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOperation {
    pub path: String,
    pub description: String,
    /// Full replacement content for the file, when known up front.
    pub new_content: Option<String>,
}

/// The AI's classification and candidate remediation for a `Failure`.
///
/// Immutable once stored — re-analysis produces a new `Analysis`, never an
/// in-place mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub failure_id: Uuid,
    pub error_type: ErrorType,
    pub category: String,
    /// Risk score in `[0, 10]`. Treated as an opaque model output by the
    /// gates; no rubric is re-derived client-side.
    pub risk_score: u8,
    pub confidence: u8,
    pub effort: Effort,
    pub proposed_fix: String,
    pub files_to_modify: Vec<String>,
    pub fix_operations: Vec<FixOperation>,
    pub reasoning: String,
    pub affected_components: Vec<String>,
    pub model_id: String,
    pub response_latency_ms: u64,
}

impl Analysis {
    /// Clamp a raw risk score into the documented `[0, 10]` range.
    pub fn clamp_risk(raw: i64) -> u8 {
        raw.clamp(0, 10) as u8
    }

    /// Clamp a raw confidence value into `[0, 100]`.
    pub fn clamp_confidence(raw: i64) -> u8 {
        raw.clamp(0, 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_is_repo_and_run_id() {
        let f = Failure::new(
            "acme/widgets",
            "main",
            "build",
            "run-42",
            "deadbeef",
            "log tail",
            "npm install timeout",
            Utc::now(),
        );
        assert_eq!(
            f.dedupe_key(),
            ("acme/widgets".to_string(), "run-42".to_string())
        );
    }

    #[test]
    fn terminal_states() {
        assert!(FailureStatus::Remediated.is_terminal());
        assert!(FailureStatus::RolledBack.is_terminal());
        assert!(FailureStatus::Failed.is_terminal());
        assert!(FailureStatus::DeveloperNotified.is_terminal());
        assert!(!FailureStatus::Detected.is_terminal());
        assert!(!FailureStatus::Gated.is_terminal());
    }

    #[test]
    fn clamp_risk_bounds() {
        assert_eq!(Analysis::clamp_risk(-5), 0);
        assert_eq!(Analysis::clamp_risk(15), 10);
        assert_eq!(Analysis::clamp_risk(7), 7);
    }

    #[test]
    fn clamp_confidence_bounds() {
        assert_eq!(Analysis::clamp_confidence(-1), 0);
        assert_eq!(Analysis::clamp_confidence(150), 100);
        assert_eq!(Analysis::clamp_confidence(42), 42);
    }
}
