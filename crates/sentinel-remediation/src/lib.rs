//! The CI auto-remediation control loop built on top of `sentinel-core`'s
//! domain model and decision services: `Poller` detects failures,
//! `Classifier` analyzes them, `Executor` applies and snapshots fixes,
//! `ApprovalManager` gates risky changes on human review, and
//! `Orchestrator` drives the whole state machine end to end.

pub mod approval;
pub mod backoff;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod poller;
pub mod scheduler;

pub use approval::{ApprovalManager, ApprovalOutcome};
pub use classifier::Classifier;
pub use config::{Config, RepositoryOverride};
pub use error::{RemediationError, Result};
pub use executor::{remediation_branch_name, ExecutionOutcome, ExecutionRequest, Executor};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RemediationOutcome};
pub use poller::{PollOutcome, Poller, DEFAULT_INTERVAL};
pub use scheduler::Scheduler;
