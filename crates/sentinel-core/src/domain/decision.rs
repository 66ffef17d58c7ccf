//! `DecisionRecord` — the auditable ledger entry for each AI decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The category of decision being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Classification,
    FixGeneration,
    RiskAssessment,
    FileSelection,
}

/// An alternative that was considered and rejected for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub option: String,
    pub score: f64,
    pub rejection_reason: String,
}

/// One immutable, auditable AI decision.
///
/// Written at every point the control loop asks a model (or a gate) to
/// choose something; never mutated after creation. Queried for post-mortem
/// via `Explainability`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: Uuid,
    pub failure_id: Uuid,
    pub kind: DecisionKind,
    pub chosen: String,
    pub alternatives: Vec<Alternative>,
    /// A short digest of the context given to the model (e.g. a hash or
    /// truncated summary), not the full prompt — keeps ledger entries small.
    pub context_digest: String,
    pub confidence: u8,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        failure_id: Uuid,
        kind: DecisionKind,
        chosen: impl Into<String>,
        alternatives: Vec<Alternative>,
        context_digest: impl Into<String>,
        confidence: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            failure_id,
            kind,
            chosen: chosen.into(),
            alternatives,
            context_digest: context_digest.into(),
            confidence,
            created_at: now,
        }
    }
}
