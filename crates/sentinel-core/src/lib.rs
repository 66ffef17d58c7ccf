//! Domain model, substrate trait ports, and decision services for the CI
//! auto-remediation control loop.
//!
//! This crate is leaves-first: `domain` defines the persisted entities,
//! `substrate` defines the external-collaborator trait ports, and the
//! remaining top-level modules are the decision services built on top of
//! both. Nothing here drives the control loop itself — that lives in
//! `sentinel-remediation`.

pub mod blast_radius;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod explainability;
pub mod gate;
pub mod health_checker;
pub mod pattern_memory;
pub mod personality;
pub mod snapshot_manager;
pub mod substrate;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use error::{CoreError, Result};

pub use blast_radius::{assess as assess_blast_radius, BlastRadiusInput, BlastRadiusScore, Level as BlastLevel};
pub use circuit_breaker::{
    admit, manual_reset, normalize_reason, record_failure, record_success, signature_for, Admission,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_AFTER,
};
pub use explainability::Explainability;
pub use gate::{evaluate as evaluate_gate, GateConfig, GateOutcome, GateResult, Verdict};
pub use health_checker::{HealthChecker, DEFAULT_DELAY_MINUTES};
pub use pattern_memory::{hashed_token_embedding, Match, PatternMemory};
pub use personality::{clamp_confidence_adjustment, compute_profile, FailureSample};
pub use snapshot_manager::{FileRollbackOutcome, RollbackReport, SnapshotManager, DEFAULT_RETENTION_DAYS};
pub use telemetry::init_tracing;

/// Crate version, for inclusion in health/status responses.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
