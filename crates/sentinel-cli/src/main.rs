//! sentinel - thin CLI for ad-hoc operations against the CI auto-remediation
//! control loop.
//!
//! ## Commands
//!
//! - `failure list` / `failure show`: inspect detected failures
//! - `decision replay` / `decision recent`: replay the AI decision ledger
//! - `poll`: trigger a manual poll of one repository/branch

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sentinel_core::domain::{DecisionRecord, Failure};
use sentinel_core::substrate::clock::SystemClock;
use sentinel_core::substrate::store::ListFilter;
use sentinel_core::substrate::vcs_client::StubVcsClient;
use sentinel_core::substrate::Store;
use sentinel_core::Explainability;
use sentinel_remediation::{PollOutcome, Poller};
use tracing::Level;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author = "ci-sentinel maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ad-hoc operations against the CI auto-remediation control loop", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and JSON command output, where supported)
    #[arg(long, global = true)]
    json: bool,

    /// Store backend: omitted or "memory" opens an ephemeral in-memory
    /// store (nothing will be visible across separate CLI invocations);
    /// any other value is treated as a file path for the durable embedded
    /// SurrealDB backend, the same one `sentineld` can be pointed at.
    #[arg(long, env = "SENTINEL_STORE_DSN", global = true)]
    store_dsn: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect detected failures
    Failure {
        #[command(subcommand)]
        command: FailureCommand,
    },
    /// Replay the AI decision ledger
    Decision {
        #[command(subcommand)]
        command: DecisionCommand,
    },
    /// Trigger a manual poll of one repository/branch pair
    Poll {
        /// Repository, e.g. "acme/widgets"
        repository: String,
        /// Branch to poll
        #[arg(default_value = "main")]
        branch: String,
    },
}

#[derive(Subcommand)]
enum FailureCommand {
    /// List failures, optionally scoped to one repository
    List {
        #[arg(long)]
        repository: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one failure by id
    Show {
        failure_id: Uuid,
    },
}

#[derive(Subcommand)]
enum DecisionCommand {
    /// Replay every decision recorded for one failure, oldest first
    Replay {
        failure_id: Uuid,
    },
    /// Show the most recently recorded decisions across all repositories
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    sentinel_core::init_tracing(cli.json, level);

    let store = sentinel_store::open_store(cli.store_dsn.as_deref())
        .await
        .context("opening configured store backend")?;

    match cli.command {
        Commands::Failure { command } => match command {
            FailureCommand::List { repository, limit } => cmd_failure_list(&*store, repository.as_deref(), limit, cli.json).await,
            FailureCommand::Show { failure_id } => cmd_failure_show(&*store, failure_id, cli.json).await,
        },
        Commands::Decision { command } => match command {
            DecisionCommand::Replay { failure_id } => cmd_decision_replay(store.clone(), failure_id, cli.json).await,
            DecisionCommand::Recent { limit } => cmd_decision_recent(store.clone(), limit, cli.json).await,
        },
        Commands::Poll { repository, branch } => cmd_poll(store.clone(), &repository, &branch, cli.json).await,
    }
}

async fn cmd_failure_list(store: &dyn Store, repository: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let mut filter = match repository {
        Some(repository) => ListFilter::for_repository(repository),
        None => ListFilter::default(),
    };
    filter = filter.with_limit(limit);
    let failures = store.list_failures(&filter).await.context("listing failures")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&failures)?);
        return Ok(());
    }
    if failures.is_empty() {
        println!("No failures found.");
        return Ok(());
    }
    for failure in &failures {
        print_failure_line(failure);
    }
    Ok(())
}

async fn cmd_failure_show(store: &dyn Store, failure_id: Uuid, json: bool) -> Result<()> {
    let failure = store
        .get_failure(failure_id)
        .await
        .context("fetching failure")?
        .with_context(|| format!("no failure found with id {failure_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&failure)?);
        return Ok(());
    }
    println!("failure     {}", failure.failure_id);
    println!("repository  {}", failure.repository);
    println!("branch      {}", failure.branch);
    println!("workflow    {} (run {})", failure.workflow_name, failure.workflow_run_id);
    println!("commit      {}", failure.commit_hash);
    println!("status      {:?}", failure.status);
    println!("detected_at {}", failure.detected_at);
    println!("reason      {}", failure.failure_reason);
    println!();
    println!("run `sentinel decision replay {}` for its decision ledger", failure.failure_id);
    Ok(())
}

async fn cmd_decision_replay(store: Arc<dyn Store>, failure_id: Uuid, json: bool) -> Result<()> {
    let ledger = Explainability::new(store);
    let decisions = ledger.for_failure(failure_id).await.context("fetching decision ledger")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }
    if decisions.is_empty() {
        println!("No decisions recorded for failure {failure_id}.");
        return Ok(());
    }
    for decision in &decisions {
        print_decision(decision);
    }
    Ok(())
}

async fn cmd_decision_recent(store: Arc<dyn Store>, limit: u32, json: bool) -> Result<()> {
    let ledger = Explainability::new(store);
    let decisions = ledger.recent(limit).await.context("fetching recent decisions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }
    if decisions.is_empty() {
        println!("No decisions recorded yet.");
        return Ok(());
    }
    for decision in &decisions {
        print_decision(decision);
    }
    Ok(())
}

async fn cmd_poll(store: Arc<dyn Store>, repository: &str, branch: &str, json: bool) -> Result<()> {
    // No production VcsClient adapter is wired into this workspace (see
    // sentinel-core::substrate::vcs_client's doc comment); a CLI-triggered
    // poll exercises the exact same Poller a daemon with a real adapter
    // would run, against the in-process stub.
    let vcs = Arc::new(StubVcsClient::new());
    let poller = Poller::new(vcs, store, Arc::new(SystemClock));
    let outcome = poller.poll(repository, branch, 0).await;

    match outcome {
        PollOutcome::Delivered(failures) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failures)?);
                return Ok(());
            }
            if failures.is_empty() {
                println!("Polled {repository}@{branch}: no new failures.");
            } else {
                println!("Polled {repository}@{branch}: {} new failure(s).", failures.len());
                for failure in &failures {
                    print_failure_line(failure);
                }
            }
        }
        PollOutcome::RateLimited { delay } => {
            println!("Polled {repository}@{branch}: rate limited, retry after {delay:?}.");
        }
    }
    Ok(())
}

fn print_failure_line(failure: &Failure) {
    println!(
        "{}  {:<24} {:<10} {:?}  {}",
        failure.failure_id, failure.repository, failure.branch, failure.status, failure.failure_reason
    );
}

fn print_decision(decision: &DecisionRecord) {
    println!("decision    {}", decision.decision_id);
    println!("kind        {:?}", decision.kind);
    println!("chosen      {}", decision.chosen);
    println!("confidence  {}", decision.confidence);
    println!("created_at  {}", decision.created_at);
    if !decision.alternatives.is_empty() {
        println!("alternatives:");
        for alt in &decision.alternatives {
            println!("  - {} (score {:.2}): {}", alt.option, alt.score, alt.rejection_reason);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_core::domain::DecisionKind;
    use sentinel_store::InMemoryStore;

    #[tokio::test]
    async fn failure_show_reports_missing_id_as_error() {
        let store = InMemoryStore::new();
        let err = cmd_failure_show(&store, Uuid::new_v4(), false).await.unwrap_err();
        assert!(err.to_string().contains("no failure found"));
    }

    #[tokio::test]
    async fn decision_replay_finds_recorded_decisions() {
        let store = Arc::new(InMemoryStore::new()) as Arc<dyn Store>;
        let failure_id = Uuid::new_v4();
        let ledger = Explainability::new(store.clone());
        ledger
            .record(DecisionRecord::new(
                failure_id,
                DecisionKind::Classification,
                "devops/dependency_resolution",
                vec![],
                "digest",
                80,
                Utc::now(),
            ))
            .await
            .unwrap();

        cmd_decision_replay(store, failure_id, false).await.unwrap();
    }

    #[tokio::test]
    async fn poll_against_unseeded_stub_finds_nothing() {
        let store = Arc::new(InMemoryStore::new()) as Arc<dyn Store>;
        cmd_poll(store, "acme/widgets", "main", false).await.unwrap();
    }
}
