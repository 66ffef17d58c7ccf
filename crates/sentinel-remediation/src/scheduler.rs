//! `Scheduler` — background jobs that resume work an `Orchestrator` had to
//! suspend mid-flight: polling a pending `ApprovalRequest`, firing a due
//! `HealthCheck`, expiring snapshots past their retention window, and
//! recomputing each repository's weekly `PersonalityProfile`. Every job
//! reads only what `Store` gives back, so a restart loses nothing beyond
//! whatever tick was in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use sentinel_core::domain::{ApprovalStatus, DecisionKind, FailureStatus, SnapshotStatus};
use sentinel_core::substrate::store::ListFilter;
use sentinel_core::substrate::{Clock, Store};
use sentinel_core::{compute_profile, FailureSample};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

/// How often the approval sweep polls every repository's pending requests.
pub const APPROVAL_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// How often the health-check sweep looks for due checks.
pub const HEALTH_CHECK_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// How often expired snapshots are marked `Expired`.
pub const SNAPSHOT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the weekly personality job checks whether it's due.
pub const PERSONALITY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const PERSONALITY_WINDOW_DAYS: i64 = 30;

/// Drives the four background jobs for a fixed set of repositories, each on
/// its own ticking loop, until `cancellation` fires.
pub struct Scheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    orchestrators: HashMap<String, Arc<Orchestrator>>,
    cancellation: CancellationToken,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        orchestrators: HashMap<String, Arc<Orchestrator>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self { store, clock, orchestrators, cancellation }
    }

    /// Run every background job concurrently. Returns once `cancellation`
    /// fires; each job loop observes it independently on its own tick.
    pub async fn run(self: Arc<Self>) {
        tokio::join!(
            self.clone().loop_with(APPROVAL_SWEEP_INTERVAL, Self::sweep_approvals),
            self.clone().loop_with(HEALTH_CHECK_SWEEP_INTERVAL, Self::sweep_health_checks),
            self.clone().loop_with(SNAPSHOT_SWEEP_INTERVAL, Self::sweep_snapshots),
            self.clone().loop_with(PERSONALITY_SWEEP_INTERVAL, Self::sweep_personalities),
        );
    }

    async fn loop_with<F, Fut>(self: Arc<Self>, interval: Duration, job: F)
    where
        F: Fn(Arc<Self>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return,
                _ = ticker.tick() => job(self.clone()).await,
            }
        }
    }

    /// Resolve every pending approval request once. Exposed as `pub` so
    /// an operator surface (or a test) can trigger a sweep on demand
    /// instead of waiting for the next tick.
    pub async fn sweep_approvals(self: Arc<Self>) {
        let pending = match self.store.pending_approvals(&ListFilter::default()).await {
            Ok(pending) => pending,
            Err(err) => {
                warn!(error = %err, "failed to list pending approvals");
                return;
            }
        };
        for request in pending.into_iter().filter(|r| r.status == ApprovalStatus::Pending) {
            let Some(orchestrator) = self.orchestrators.get(&request.repository).cloned() else {
                warn!(repository = %request.repository, "no orchestrator configured for approval request's repository");
                continue;
            };
            let request_id = request.request_id;
            if let Err(err) = orchestrator.resolve_approval(request).await {
                warn!(request_id = %request_id, error = %err, "approval sweep failed, will retry next tick");
            }
        }
    }

    /// Resolve every health check due by now. Same rationale as
    /// [`Self::sweep_approvals`] for being `pub`.
    pub async fn sweep_health_checks(self: Arc<Self>) {
        let now = self.clock.now();
        let due = match self.store.pending_health_checks(now).await {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "failed to list due health checks");
                return;
            }
        };
        for check in due {
            let Some(orchestrator) = self.orchestrators.get(&check.repository).cloned() else {
                warn!(repository = %check.repository, "no orchestrator configured for health check's repository");
                continue;
            };
            let check_id = check.check_id;
            if let Err(err) = orchestrator.resolve_health_check(check).await {
                warn!(check_id = %check_id, error = %err, "health check sweep failed, will retry next tick");
            }
        }
    }

    pub async fn sweep_snapshots(self: Arc<Self>) {
        let now = self.clock.now();
        let snapshots = match self.store.list_snapshots(&ListFilter::default()).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                warn!(error = %err, "failed to list snapshots for expiry sweep");
                return;
            }
        };
        for snapshot in snapshots.into_iter().filter(|s| s.status == SnapshotStatus::Active && s.is_expired_at(now)) {
            let snapshot_id = snapshot.snapshot_id;
            match self.store.delete_snapshot(snapshot_id).await {
                Ok(()) => info!(snapshot_id = %snapshot_id, "snapshot deleted past its retention window"),
                Err(err) => warn!(snapshot_id = %snapshot_id, error = %err, "failed to delete expired snapshot"),
            }
        }
    }

    pub async fn sweep_personalities(self: Arc<Self>) {
        let now = self.clock.now();
        if !is_personality_report_due(now) {
            return;
        }
        for repository in self.orchestrators.keys() {
            let profile = match self.build_personality_profile(repository, now).await {
                Ok(profile) => profile,
                Err(err) => {
                    warn!(repository, error = %err, "failed to gather failure history for weekly personality profile");
                    continue;
                }
            };
            let total = profile.total_failures;
            match self.store.upsert_personality(&profile).await {
                Ok(()) => info!(repository, total_failures = total, "weekly personality profile recomputed"),
                Err(err) => warn!(repository, error = %err, "failed to persist weekly personality profile"),
            }
        }
    }

    async fn build_personality_profile(&self, repository: &str, now: DateTime<Utc>) -> sentinel_core::Result<sentinel_core::domain::PersonalityProfile> {
        let window_start = now - chrono::Duration::days(PERSONALITY_WINDOW_DAYS);
        let failures = self.store.list_failures(&ListFilter::for_repository(repository)).await?;

        let mut samples = Vec::new();
        for failure in failures.into_iter().filter(|f| f.detected_at >= window_start) {
            let decisions = self.store.decisions_for_failure(failure.failure_id).await.unwrap_or_default();
            let category = decisions
                .into_iter()
                .find(|d| d.kind == DecisionKind::Classification)
                .map(|d| d.chosen.split('/').next().unwrap_or("unknown").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            samples.push(FailureSample {
                category,
                occurred_at: failure.detected_at,
                resolution_minutes: None,
                succeeded: failure.status == FailureStatus::Remediated,
            });
        }

        Ok(compute_profile(repository, &samples, now))
    }
}

fn is_personality_report_due(now: DateTime<Utc>) -> bool {
    now.weekday() == chrono::Weekday::Mon && now.hour() == 9
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::SnapshotFile;
    use sentinel_core::substrate::clock::ManualClock;
    use sentinel_store::InMemoryStore;

    fn monday_nine_am() -> DateTime<Utc> {
        let mut d = Utc::now();
        while d.weekday() != chrono::Weekday::Mon {
            d += chrono::Duration::days(1);
        }
        d.date_naive().and_hms_opt(9, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn personality_report_due_only_monday_nine_am() {
        let due = monday_nine_am();
        assert!(is_personality_report_due(due));
        assert!(!is_personality_report_due(due + chrono::Duration::hours(1)));
        assert!(!is_personality_report_due(due + chrono::Duration::days(1)));
    }

    #[tokio::test]
    async fn snapshot_sweep_deletes_only_due_snapshots() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let scheduler = Arc::new(Scheduler::new(store.clone(), clock, HashMap::new(), CancellationToken::new()));

        let expired = sentinel_core::domain::Snapshot::new(
            "acme/widgets",
            uuid::Uuid::new_v4(),
            "sentinel/fix-1",
            "deadbeef",
            vec![SnapshotFile::capture("a.txt", b"x".to_vec())],
            "dependency_resolution",
            "bump lockfile",
            now - chrono::Duration::days(10),
            1,
        );
        let fresh = sentinel_core::domain::Snapshot::new(
            "acme/widgets",
            uuid::Uuid::new_v4(),
            "sentinel/fix-2",
            "deadbeef",
            vec![SnapshotFile::capture("b.txt", b"y".to_vec())],
            "flaky_test",
            "retry flaky test",
            now,
            30,
        );
        store.upsert_snapshot(&expired).await.unwrap();
        store.upsert_snapshot(&fresh).await.unwrap();

        scheduler.sweep_snapshots().await;

        let stored_expired = store.get_snapshot(expired.snapshot_id).await.unwrap();
        let stored_fresh = store.get_snapshot(fresh.snapshot_id).await.unwrap().unwrap();
        assert!(stored_expired.is_none());
        assert_eq!(stored_fresh.status, SnapshotStatus::Active);
    }
}
