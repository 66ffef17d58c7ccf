//! `Pattern` — a stored (failure → successful fix) example for recall.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which embedding family produced a pattern's vector. Similarity queries
/// must not mix families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFamily {
    /// Produced by a configured embedding endpoint.
    ModelEndpoint,
    /// Deterministic local hashed-token projection (fallback).
    HashedToken,
}

/// A recalled (failure → successful fix) example, inserted only after a
/// confirmed success unless a negative-example policy is explicitly
/// enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub error_signature: String,
    pub category: String,
    pub proposed_fix: String,
    pub files_modified: Vec<String>,
    pub fix_commands: Vec<String>,
    pub fix_successful: bool,
    pub resolution_time_ms: u64,
    pub embedding: Vec<f32>,
    pub embedding_family: EmbeddingFamily,
    pub created_at: DateTime<Utc>,
}

impl Pattern {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        error_signature: impl Into<String>,
        category: impl Into<String>,
        proposed_fix: impl Into<String>,
        files_modified: Vec<String>,
        fix_commands: Vec<String>,
        fix_successful: bool,
        resolution_time_ms: u64,
        embedding: Vec<f32>,
        embedding_family: EmbeddingFamily,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pattern_id: Uuid::new_v4(),
            repository: repository.into(),
            branch: branch.into(),
            error_signature: error_signature.into(),
            category: category.into(),
            proposed_fix: proposed_fix.into(),
            files_modified,
            fix_commands,
            fix_successful,
            resolution_time_ms,
            embedding,
            embedding_family,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pattern_gets_fresh_id() {
        let now = Utc::now();
        let p = Pattern::new(
            "acme/widgets",
            "main",
            "sig",
            "dependency_resolution",
            "bump lockfile",
            vec!["package-lock.json".into()],
            vec!["npm install".into()],
            true,
            12_000,
            vec![0.1, 0.2],
            EmbeddingFamily::HashedToken,
            now,
        );
        assert!(p.fix_successful);
        assert_eq!(p.embedding_family, EmbeddingFamily::HashedToken);
    }
}
