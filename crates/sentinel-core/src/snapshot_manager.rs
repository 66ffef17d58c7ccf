//! `SnapshotManager` — captures pre-edit file state and performs rollback
//! when a `HealthCheck` or an operator decides a remediation must be
//! reverted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Snapshot, SnapshotFile, SnapshotStatus};
use crate::error::Result;
use crate::substrate::{FileWrite, Store, VcsClient};

/// Fallback retention window for callers with no configured value of
/// their own (e.g. this module's unit tests).
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

pub struct SnapshotManager {
    store: Arc<dyn Store>,
    vcs: Arc<dyn VcsClient>,
}

/// Per-file outcome of a rollback attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRollbackOutcome {
    pub path: String,
    pub reverted: bool,
    pub hash_mismatch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub snapshot_id: Uuid,
    pub partial: bool,
    pub files: Vec<FileRollbackOutcome>,
}

impl SnapshotManager {
    pub fn new(store: Arc<dyn Store>, vcs: Arc<dyn VcsClient>) -> Self {
        Self { store, vcs }
    }

    /// Capture the pre-change bytes of every path in `paths` before any
    /// write. The remediation must abort if this fails. `retention_days`
    /// is the caller's configured retention window; pass
    /// `DEFAULT_RETENTION_DAYS` if none is configured.
    #[allow(clippy::too_many_arguments)]
    pub async fn capture(
        &self,
        repository: &str,
        remediation_id: Uuid,
        branch: &str,
        base_commit_sha: &str,
        paths: &[String],
        category: &str,
        proposed_fix: &str,
        now: DateTime<Utc>,
        retention_days: i64,
    ) -> Result<Snapshot> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = self.vcs.read_file(repository, branch, path).await?;
            files.push(SnapshotFile::capture(path.clone(), bytes));
        }
        let snapshot = Snapshot::new(
            repository,
            remediation_id,
            branch,
            base_commit_sha,
            files,
            category,
            proposed_fix,
            now,
            retention_days,
        );
        self.store.upsert_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Record the post-edit hash for each touched file once the Executor
    /// has applied its edits, so a later rollback can detect drift.
    pub async fn record_post_edit(&self, snapshot: &mut Snapshot, written: &[FileWrite]) -> Result<()> {
        for file in &mut snapshot.files {
            if let Some(write) = written.iter().find(|w| w.path == file.path) {
                file.record_post_edit(&write.content);
            }
        }
        self.store.upsert_snapshot(snapshot).await
    }

    /// Write the captured bytes back for every file in the snapshot. If a
    /// file's current content no longer matches the hash recorded right
    /// after the remediation's own edit (something else touched it since),
    /// the revert still proceeds but the outcome is flagged as a hash
    /// mismatch and the overall report as partial.
    pub async fn rollback(&self, repository: &str, branch: &str, snapshot: &Snapshot) -> Result<RollbackReport> {
        let mut outcomes = Vec::with_capacity(snapshot.files.len());
        let mut writes = Vec::with_capacity(snapshot.files.len());

        for file in &snapshot.files {
            let current = self.vcs.read_file(repository, branch, &file.path).await?;
            let current_hash = {
                use sha2::Digest;
                let mut hasher = sha2::Sha256::new();
                hasher.update(&current);
                hex::encode(hasher.finalize())
            };
            let hash_mismatch = file.post_edit_hash.as_deref().is_some_and(|expected| expected != current_hash);
            outcomes.push(FileRollbackOutcome {
                path: file.path.clone(),
                reverted: !hash_mismatch,
                hash_mismatch,
            });
            if !hash_mismatch {
                writes.push(FileWrite {
                    path: file.path.clone(),
                    content: file.content_bytes.clone(),
                });
            }
        }

        self.vcs.write_files(repository, branch, &writes).await?;

        let partial = outcomes.iter().any(|o| o.hash_mismatch);
        let mut updated = snapshot.clone();
        updated.status = SnapshotStatus::RolledBack;
        self.store.upsert_snapshot(&updated).await?;

        Ok(RollbackReport {
            snapshot_id: snapshot.snapshot_id,
            partial,
            files: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::vcs_client::StubVcsClient;
    use crate::testing::InMemoryStore;

    #[tokio::test]
    async fn capture_then_rollback_restores_bytes() {
        let store = Arc::new(InMemoryStore::new());
        let vcs = Arc::new(StubVcsClient::new());
        vcs.write_files(
            "acme/widgets",
            "sentinel/fix-1",
            &[FileWrite {
                path: "package-lock.json".into(),
                content: b"original".to_vec(),
            }],
        )
        .await
        .unwrap();

        let manager = SnapshotManager::new(store.clone(), vcs.clone());
        let mut snapshot = manager
            .capture(
                "acme/widgets",
                Uuid::new_v4(),
                "sentinel/fix-1",
                "abc123",
                &["package-lock.json".to_string()],
                "dependency_resolution",
                "bump lockfile",
                Utc::now(),
                DEFAULT_RETENTION_DAYS,
            )
            .await
            .unwrap();

        let edit = FileWrite {
            path: "package-lock.json".into(),
            content: b"edited".to_vec(),
        };
        vcs.write_files("acme/widgets", "sentinel/fix-1", std::slice::from_ref(&edit)).await.unwrap();
        manager.record_post_edit(&mut snapshot, std::slice::from_ref(&edit)).await.unwrap();

        let report = manager.rollback("acme/widgets", "sentinel/fix-1", &snapshot).await.unwrap();
        assert!(!report.partial);

        let restored = vcs.read_file("acme/widgets", "sentinel/fix-1", "package-lock.json").await.unwrap();
        assert_eq!(restored, b"original");
    }

    #[tokio::test]
    async fn rollback_flags_hash_mismatch_when_modified_after_capture() {
        let store = Arc::new(InMemoryStore::new());
        let vcs = Arc::new(StubVcsClient::new());
        let manager = SnapshotManager::new(store.clone(), vcs.clone());

        let mut snapshot = manager
            .capture(
                "acme/widgets",
                Uuid::new_v4(),
                "sentinel/fix-1",
                "abc123",
                &["README.md".to_string()],
                "flaky_test",
                "retry flaky test",
                Utc::now(),
                DEFAULT_RETENTION_DAYS,
            )
            .await
            .unwrap();

        let edit = FileWrite {
            path: "README.md".into(),
            content: b"the remediation's own edit".to_vec(),
        };
        manager.record_post_edit(&mut snapshot, std::slice::from_ref(&edit)).await.unwrap();

        // Something other than the remediation's own edit lands on the
        // branch before the health check fires.
        vcs.write_files(
            "acme/widgets",
            "sentinel/fix-1",
            &[FileWrite {
                path: "README.md".into(),
                content: b"someone else's edit".to_vec(),
            }],
        )
        .await
        .unwrap();

        let report = manager.rollback("acme/widgets", "sentinel/fix-1", &snapshot).await.unwrap();
        assert!(report.partial);
        assert!(report.files[0].hash_mismatch);
    }
}
