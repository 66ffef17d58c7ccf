//! sentineld — the CI auto-remediation control loop daemon.
//!
//! Loads configuration, constructs the substrate, wires one `Orchestrator`
//! per configured repository, runs the background jobs (`Scheduler`) and a
//! periodic poll loop per repository, and serves the thin dashboard/metrics
//! HTTP surface until asked to shut down.

mod http;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_core::domain::Failure;
use sentinel_core::substrate::clock::SystemClock;
use sentinel_core::substrate::model_client::StubModelClient;
use sentinel_core::substrate::notifier::StubNotifier;
use sentinel_core::substrate::vcs_client::StubVcsClient;
use sentinel_core::substrate::{Clock, ModelClient, Notifier, VcsClient};
use sentinel_core::PatternMemory;
use sentinel_remediation::{ApprovalManager, Classifier, Config, Executor, Orchestrator, PollOutcome, Poller, Scheduler};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "sentineld")]
#[command(author = "ci-sentinel maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CI auto-remediation control loop daemon", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "SENTINEL_CONFIG", default_value = "./sentinel.toml")]
    config: PathBuf,

    /// Address the dashboard/metrics HTTP surface binds to.
    #[arg(long, env = "SENTINEL_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// Store backend DSN; see `sentinel_store::open_store`.
    #[arg(long, env = "SENTINEL_STORE_DSN")]
    store_dsn: Option<String>,

    /// VCS host auth token. No production `VcsClient` is wired into this
    /// workspace (see sentinel-core::substrate::vcs_client's doc comment),
    /// so this is accepted and logged-as-present only, for operators
    /// wiring their own adapter in ahead of that integration.
    #[arg(long, env = "SENTINEL_VCS_TOKEN")]
    vcs_token: Option<String>,

    /// LLM endpoint auth key. Same caveat as `vcs_token`: no production
    /// `ModelClient` ships here.
    #[arg(long, env = "SENTINEL_LLM_KEY")]
    llm_key: Option<String>,

    /// Notifier auth token. Same caveat as `vcs_token`.
    #[arg(long, env = "SENTINEL_NOTIFIER_TOKEN")]
    notifier_token: Option<String>,

    /// Emit JSON-formatted log lines.
    #[arg(long)]
    json: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    sentinel_core::init_tracing(cli.json, level);

    for (flag, value) in [
        ("SENTINEL_VCS_TOKEN", &cli.vcs_token),
        ("SENTINEL_LLM_KEY", &cli.llm_key),
        ("SENTINEL_NOTIFIER_TOKEN", &cli.notifier_token),
    ] {
        if value.is_some() {
            info!(flag, "credential supplied (no production adapter wired in this build)");
        }
    }

    let config = Config::load(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;

    let store = sentinel_store::open_store(cli.store_dsn.as_deref())
        .await
        .context("opening configured store backend")?;
    let vcs: Arc<dyn VcsClient> = Arc::new(StubVcsClient::new());
    let model: Arc<dyn ModelClient> = Arc::new(StubModelClient::new(Vec::new()));
    let notifier: Arc<dyn Notifier> = Arc::new(StubNotifier::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let patterns = Arc::new(PatternMemory::new());

    let fleet_size = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).saturating_mul(2).max(8);
    let fleet_limit = Arc::new(Semaphore::new(fleet_size));
    let cancellation = CancellationToken::new();

    let repositories = config.managed_repositories();
    if repositories.is_empty() {
        warn!("no repositories configured under [repositories.*] or protected_repositories; daemon will idle");
    }

    let mut orchestrators = HashMap::new();
    for repository in &repositories {
        let orchestrator_config = config.orchestrator_config(repository);
        let classifier = Classifier::new(model.clone(), patterns.clone(), "stub-model");
        let executor = Executor::new(vcs.clone(), store.clone(), clock.clone(), notifier.clone());
        let approval = ApprovalManager::new(vcs.clone(), store.clone(), clock.clone(), notifier.clone());
        let orchestrator = Orchestrator::new(
            orchestrator_config,
            classifier,
            executor,
            approval,
            vcs.clone(),
            store.clone(),
            clock.clone(),
            notifier.clone(),
            patterns.clone(),
            fleet_limit.clone(),
            cancellation.clone(),
        );
        orchestrators.insert(repository.clone(), Arc::new(orchestrator));
    }

    let scheduler = Arc::new(Scheduler::new(store.clone(), clock.clone(), orchestrators.clone(), cancellation.clone()));
    let scheduler_handle = tokio::spawn(scheduler.run());

    let mut poll_handles = Vec::new();
    for repository in &repositories {
        let orchestrator_config = config.orchestrator_config(repository);
        let orchestrator = orchestrators.get(repository).expect("just inserted").clone();
        let poller = Arc::new(Poller::new(vcs.clone(), store.clone(), clock.clone()));
        let interval = Duration::from_secs(config.polling_interval_minutes * 60);
        let branch = orchestrator_config.default_branch.clone();
        let repository = repository.clone();
        let cancellation = cancellation.clone();
        poll_handles.push(tokio::spawn(poll_loop(poller, orchestrator, repository, branch, interval, cancellation)));
    }

    let app = http::router(store.clone());
    let listener = tokio::net::TcpListener::bind(&cli.bind_addr)
        .await
        .with_context(|| format!("binding dashboard/metrics surface to {}", cli.bind_addr))?;
    info!(addr = %cli.bind_addr, "dashboard/metrics surface listening");

    let shutdown_cancellation = cancellation.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received shutdown signal"),
            _ = shutdown_cancellation.cancelled() => {}
        }
    });

    server.await.context("dashboard/metrics surface exited")?;

    cancellation.cancel();
    scheduler_handle.abort();
    for handle in poll_handles {
        handle.abort();
    }
    Ok(())
}

/// Tick `poller` every (jittered) `interval`, dispatching every freshly
/// delivered `Failure` to `orchestrator.process_failure` as its own task —
/// the orchestrator's own semaphore and per-repo mutex bound how many of
/// those actually run concurrently. Runs until `cancellation` fires.
async fn poll_loop(
    poller: Arc<Poller>,
    orchestrator: Arc<Orchestrator>,
    repository: String,
    branch: String,
    interval: Duration,
    cancellation: CancellationToken,
) {
    let mut attempt = 0u32;
    loop {
        if cancellation.is_cancelled() {
            return;
        }
        match poller.poll(&repository, &branch, attempt).await {
            PollOutcome::Delivered(failures) => {
                attempt = 0;
                for failure in failures {
                    dispatch(orchestrator.clone(), failure);
                }
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    _ = tokio::time::sleep(sentinel_remediation::poller::jittered_interval(interval)) => {}
                }
            }
            PollOutcome::RateLimited { delay } => {
                attempt = attempt.saturating_add(1);
                tokio::select! {
                    _ = cancellation.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

fn dispatch(orchestrator: Arc<Orchestrator>, failure: Failure) {
    let failure_id = failure.failure_id;
    let repository = failure.repository.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.process_failure(failure).await {
            warn!(repository, %failure_id, error = %err, "failed to process detected failure");
        }
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn fleet_size_floors_at_eight() {
        let size = 1usize.saturating_mul(2).max(8);
        assert_eq!(size, 8);
        let size = 6usize.saturating_mul(2).max(8);
        assert_eq!(size, 12);
    }
}
