//! `Poller` — per-repository ticker that turns newly failed workflow runs
//! into `Failure` records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sentinel_core::domain::{ActionKind, Failure, Outcome};
use sentinel_core::substrate::store::ListFilter;
use sentinel_core::substrate::{Clock, Store, VcsClient, WorkflowRunStatus};
use sentinel_core::{domain::AuditEntry, CoreError};
use tracing::{debug, info, warn};

use crate::backoff::full_jitter;
use crate::error::Result;

/// Default polling interval, before ±10% jitter.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Bounded tail of captured logs kept per Failure.
const LOG_TAIL_BYTES: usize = 256 * 1024;
/// Fallback line count when no heuristic line matches.
const LOG_TAIL_LINES: usize = 40;

const RATE_LIMIT_BASE: Duration = Duration::from_secs(1);
const RATE_LIMIT_CAP: Duration = Duration::from_secs(60);

/// Heuristic substrings that mark a log line as the likely failure reason.
/// Checked in order; the first line in the log containing any of these
/// (case-insensitive) wins.
const REASON_MARKERS: &[&str] = &[
    "error:",
    "assertionerror",
    "exception",
    "failed:",
    " failed ",
    "fatal:",
    "panicked at",
    "timeout",
    "timed out",
];

/// Apply the jitter band (±10%) to a base interval.
pub fn jittered_interval(base: Duration) -> Duration {
    let base_ms = base.as_millis() as i64;
    let band = base_ms / 10;
    let offset = rand::thread_rng().gen_range(-band..=band);
    Duration::from_millis((base_ms + offset).max(0) as u64)
}

/// Extract the failure reason from a run's raw logs: the first line
/// matching a known heuristic marker, else the trailing `LOG_TAIL_LINES`
/// lines joined.
pub fn extract_failure_reason(logs: &str) -> String {
    for line in logs.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();
        if REASON_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return trimmed.to_string();
        }
    }
    logs.lines()
        .rev()
        .take(LOG_TAIL_LINES)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate captured logs to the trailing `LOG_TAIL_BYTES` bytes, cutting
/// at a line boundary where possible.
pub fn truncate_logs(logs: &str) -> String {
    if logs.len() <= LOG_TAIL_BYTES {
        return logs.to_string();
    }
    let start = logs.len() - LOG_TAIL_BYTES;
    match logs[start..].find('\n') {
        Some(idx) => logs[start + idx + 1..].to_string(),
        None => logs[start..].to_string(),
    }
}

/// The outcome of one poll attempt against a repository/branch pair.
pub enum PollOutcome {
    /// New failures were (or were not) found; the caller should poll again
    /// after the normal jittered interval.
    Delivered(Vec<Failure>),
    /// The upstream signaled a rate limit; the caller should wait `delay`
    /// before retrying this repository, instead of the normal interval.
    RateLimited { delay: Duration },
}

pub struct Poller {
    vcs: Arc<dyn VcsClient>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Poller {
    pub fn new(vcs: Arc<dyn VcsClient>, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { vcs, store, clock }
    }

    /// Poll one `(repository, branch)` pair, attempt `attempt` (zero-based,
    /// used only to size the rate-limit backoff on retry).
    pub async fn poll(&self, repository: &str, branch: &str, attempt: u32) -> PollOutcome {
        let runs = match self.vcs.list_workflow_runs(repository, branch).await {
            Ok(runs) => runs,
            Err(CoreError::RateLimited { retry_after_secs }) => {
                let floor = Duration::from_secs(retry_after_secs);
                let jittered = full_jitter(RATE_LIMIT_BASE, RATE_LIMIT_CAP, attempt);
                warn!(repository, branch, retry_after_secs, "poller rate limited, backing off");
                return PollOutcome::RateLimited {
                    delay: floor.max(jittered),
                };
            }
            Err(err) => {
                warn!(repository, branch, error = %err, "poll failed, will retry next tick");
                return PollOutcome::Delivered(Vec::new());
            }
        };

        let mut fresh = Vec::new();
        for run in runs.into_iter().filter(|r| r.status == WorkflowRunStatus::Failure) {
            match self.already_seen(repository, &run.run_id.to_string()).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    warn!(repository, branch, error = %err, "dedupe lookup failed, skipping run this tick");
                    continue;
                }
            }

            let logs = self.vcs.fetch_run_logs(repository, run.run_id).await.unwrap_or_default();
            let captured_logs = truncate_logs(&logs);
            let failure_reason = extract_failure_reason(&captured_logs);

            let failure = Failure::new(
                repository,
                branch,
                run.workflow_name.clone(),
                run.run_id.to_string(),
                run.commit_sha.clone(),
                captured_logs,
                failure_reason,
                self.clock.now(),
            );

            if let Err(err) = self.store.upsert_failure(&failure).await {
                warn!(repository, branch, run_id = run.run_id, error = %err, "failed to persist new failure");
                continue;
            }
            self.audit_poll(&failure).await;
            info!(repository, branch, run_id = run.run_id, failure_id = %failure.failure_id, "new failure detected");
            fresh.push(failure);
        }

        PollOutcome::Delivered(fresh)
    }

    async fn already_seen(&self, repository: &str, workflow_run_id: &str) -> Result<bool> {
        let existing = self
            .store
            .list_failures(&ListFilter::for_repository(repository))
            .await?;
        Ok(existing.iter().any(|f| f.workflow_run_id == workflow_run_id))
    }

    async fn audit_poll(&self, failure: &Failure) {
        let entry = AuditEntry::new(
            "poller",
            ActionKind::Poll,
            Some(failure.failure_id),
            Outcome::Success,
            serde_json::json!({
                "repository": failure.repository,
                "branch": failure.branch,
                "workflow_run_id": failure.workflow_run_id,
            }),
            self.clock.now(),
        );
        if let Err(err) = self.store.append_audit(&entry).await {
            debug!(error = %err, "failed to append poll audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use sentinel_core::substrate::clock::SystemClock;
    use sentinel_core::substrate::vcs_client::{StubVcsClient, WorkflowRun};
    use sentinel_store::InMemoryStore;

    fn run(run_id: u64, status: WorkflowRunStatus) -> WorkflowRun {
        WorkflowRun {
            run_id,
            repository: "acme/widgets".into(),
            branch: "main".into(),
            workflow_name: "build".into(),
            commit_sha: "deadbeef".into(),
            status,
            started_at: DateTime::<Utc>::from(std::time::SystemTime::now()),
        }
    }

    fn poller() -> (Poller, Arc<StubVcsClient>, Arc<InMemoryStore>) {
        let vcs = Arc::new(StubVcsClient::new());
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(SystemClock);
        (Poller::new(vcs.clone(), store.clone(), clock), vcs, store)
    }

    #[tokio::test]
    async fn polling_same_run_twice_creates_one_failure() {
        let (poller, vcs, store) = poller();
        vcs.seed_runs("acme/widgets", "main", vec![run(1, WorkflowRunStatus::Failure)]);

        let PollOutcome::Delivered(first) = poller.poll("acme/widgets", "main", 0).await else {
            panic!("expected delivered");
        };
        assert_eq!(first.len(), 1);

        let PollOutcome::Delivered(second) = poller.poll("acme/widgets", "main", 0).await else {
            panic!("expected delivered");
        };
        assert!(second.is_empty());

        let stored = store
            .list_failures(&ListFilter::for_repository("acme/widgets"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn only_failed_runs_are_captured() {
        let (poller, vcs, _store) = poller();
        vcs.seed_runs(
            "acme/widgets",
            "main",
            vec![run(1, WorkflowRunStatus::Success), run(2, WorkflowRunStatus::Failure)],
        );
        let PollOutcome::Delivered(found) = poller.poll("acme/widgets", "main", 0).await else {
            panic!("expected delivered");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workflow_run_id, "2");
    }

    #[test]
    fn reason_extraction_prefers_marker_line() {
        let logs = "building...\nrunning tests\nError: npm install failed due to timeout\nnext line";
        assert_eq!(extract_failure_reason(logs), "Error: npm install failed due to timeout");
    }

    #[test]
    fn reason_extraction_falls_back_to_tail() {
        let logs = (0..50).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let reason = extract_failure_reason(&logs);
        assert_eq!(reason.lines().count(), LOG_TAIL_LINES);
        assert!(reason.ends_with("line 49"));
    }

    #[test]
    fn jittered_interval_stays_within_band() {
        let base = DEFAULT_INTERVAL;
        for _ in 0..50 {
            let jittered = jittered_interval(base);
            let lower = base.mul_f64(0.9);
            let upper = base.mul_f64(1.1);
            assert!(jittered >= lower && jittered <= upper);
        }
    }
}
