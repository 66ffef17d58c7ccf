//! `Snapshot` — pre-edit capture of file bytes, the rollback target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Active,
    RolledBack,
    Expired,
}

/// One captured file: its path, content hash, and raw bytes as of
/// `base_commit_sha`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: String,
    pub content_hash: String,
    pub content_bytes: Vec<u8>,
    /// Hash of the bytes the Executor wrote immediately after capture, set
    /// once the edit lands. Rollback compares the file's hash right before
    /// reverting against this value: a mismatch means something besides
    /// the remediation's own edit touched the file since, and the revert
    /// is flagged partial rather than silently clobbering it.
    pub post_edit_hash: Option<String>,
}

impl SnapshotFile {
    pub fn capture(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content_hash: hash_bytes(&bytes),
            content_bytes: bytes,
            post_edit_hash: None,
        }
    }

    pub fn record_post_edit(&mut self, bytes: &[u8]) {
        self.post_edit_hash = Some(hash_bytes(bytes));
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A pre-edit capture of the files the Executor is about to touch.
///
/// Captured immediately before any write; rollback validates hashes before
/// writing the captured bytes back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: Uuid,
    pub repository: String,
    pub remediation_id: Uuid,
    pub branch: String,
    pub base_commit_sha: String,
    pub files: Vec<SnapshotFile>,
    /// The failure category and proposed-fix summary this remediation was
    /// classified under, carried here (rather than only on the ephemeral
    /// `Analysis`) so a pattern can still be recorded once the outcome is
    /// known, long after the `Analysis` that produced it is gone.
    pub category: String,
    pub proposed_fix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SnapshotStatus,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: impl Into<String>,
        remediation_id: Uuid,
        branch: impl Into<String>,
        base_commit_sha: impl Into<String>,
        files: Vec<SnapshotFile>,
        category: impl Into<String>,
        proposed_fix: impl Into<String>,
        now: DateTime<Utc>,
        retention_days: i64,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            repository: repository.into(),
            remediation_id,
            branch: branch.into(),
            base_commit_sha: base_commit_sha.into(),
            files,
            category: category.into(),
            proposed_fix: proposed_fix.into(),
            created_at: now,
            expires_at: now + chrono::Duration::days(retention_days),
            status: SnapshotStatus::Active,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_hashes_content() {
        let f = SnapshotFile::capture("a.txt", b"hello".to_vec());
        assert_eq!(f.content_hash.len(), 64);
    }

    #[test]
    fn same_content_same_hash() {
        let a = SnapshotFile::capture("a.txt", b"hello".to_vec());
        let b = SnapshotFile::capture("b.txt", b"hello".to_vec());
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn expiry_respects_retention() {
        let now = Utc::now();
        let snap = Snapshot::new(
            "acme/widgets",
            Uuid::new_v4(),
            "main",
            "abc123",
            vec![],
            "dependency_resolution",
            "bump lockfile",
            now,
            7,
        );
        assert!(!snap.is_expired_at(now));
        assert!(snap.is_expired_at(now + chrono::Duration::days(8)));
    }
}
