//! Domain models for the CI auto-remediation control loop.
//!
//! Canonical definitions for the entities a `Failure` travels through:
//! detection, AI analysis, gating, remediation, and — when things go
//! wrong — rollback.

pub mod approval;
pub mod audit;
pub mod circuit;
pub mod decision;
pub mod failure;
pub mod health;
pub mod pattern;
pub mod personality;
pub mod snapshot;

pub use approval::{reviewer_requirement, ApprovalRequest, ApprovalStatus, ReviewerTier};
pub use audit::{ActionKind, AuditEntry, Outcome};
pub use circuit::{CircuitState, CircuitStatus, CircuitTransition, FailureSignature};
pub use decision::{Alternative, DecisionKind, DecisionRecord};
pub use failure::{Analysis, Effort, ErrorType, Failure, FailureStatus, FixOperation};
pub use health::{HealthCheck, HealthCheckItem};
pub use pattern::{EmbeddingFamily, Pattern};
pub use personality::{DetectedPattern, DetectedPatternKind, PersonalityProfile};
pub use snapshot::{Snapshot, SnapshotFile, SnapshotStatus};
