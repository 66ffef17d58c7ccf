//! `ApprovalRequest` — the escalation path when `SafetyGate` requires review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A request for human approval, created only when `SafetyGate` returns
/// `RequireApproval`. Terminal on resolve or expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: Uuid,
    pub failure_id: Uuid,
    pub remediation_id: Uuid,
    pub snapshot_id: Uuid,
    pub repository: String,
    /// The remediation branch under review, so a scheduler resolving this
    /// request after a restart can roll back without recomputing it.
    pub branch: String,
    pub pr_number: Option<u64>,
    pub deployment_id: Option<u64>,
    pub required_reviewers: Vec<String>,
    pub environment_name: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl ApprovalRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        failure_id: Uuid,
        remediation_id: Uuid,
        snapshot_id: Uuid,
        repository: impl Into<String>,
        branch: impl Into<String>,
        required_reviewers: Vec<String>,
        environment_name: impl Into<String>,
        now: DateTime<Utc>,
        timeout_hours: i64,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            failure_id,
            remediation_id,
            snapshot_id,
            repository: repository.into(),
            branch: branch.into(),
            pr_number: None,
            deployment_id: None,
            required_reviewers,
            environment_name: environment_name.into(),
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::hours(timeout_hours),
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now >= self.expires_at
    }

    pub fn resolve(&mut self, status: ApprovalStatus, resolved_by: impl Into<String>, now: DateTime<Utc>) {
        self.status = status;
        self.resolved_by = Some(resolved_by.into());
        self.resolved_at = Some(now);
    }
}

/// Which pool of reviewers an approval request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerTier {
    AnyTeamMember,
    Senior,
}

/// Reviewer selection by risk score: `>=8` two seniors,
/// `>=5` one senior, else any team member.
pub fn reviewer_requirement(risk_score: u8) -> (u32, ReviewerTier) {
    if risk_score >= 8 {
        (2, ReviewerTier::Senior)
    } else if risk_score >= 5 {
        (1, ReviewerTier::Senior)
    } else {
        (1, ReviewerTier::AnyTeamMember)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_only_while_pending() {
        let now = Utc::now();
        let mut req = ApprovalRequest::new(
            Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(),
            "acme/widgets", "sentinel/fix-abc", vec![], "prod-review", now, 24,
        );
        assert!(!req.is_expired_at(now));
        assert!(req.is_expired_at(now + chrono::Duration::hours(25)));
        req.resolve(ApprovalStatus::Approved, "alice", now + chrono::Duration::hours(1));
        assert!(!req.is_expired_at(now + chrono::Duration::hours(25)));
    }

    #[test]
    fn reviewer_tiers() {
        assert_eq!(reviewer_requirement(9), (2, ReviewerTier::Senior));
        assert_eq!(reviewer_requirement(6), (1, ReviewerTier::Senior));
        assert_eq!(reviewer_requirement(2), (1, ReviewerTier::AnyTeamMember));
    }
}
