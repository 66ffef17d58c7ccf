//! `CircuitBreaker` — freezes remediation for a failure signature after
//! repeated consecutive failures, so a persistently broken fix attempt
//! doesn't keep hammering the same branch.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::domain::{CircuitState, CircuitStatus, FailureSignature};

/// Default consecutive-failure count that trips the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default cooldown before an OPEN circuit becomes eligible for a retry.
pub const DEFAULT_RESET_AFTER: Duration = Duration::hours(24);

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());
static ISO_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}(\.\d+)?").unwrap());
static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bline\s+\d+\b").unwrap());
static POSIX_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/[\w.\-/]+").unwrap());
static WINDOWS_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]:\\[\w.\-\\]+").unwrap());
static MEMORY_ADDR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap());
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").unwrap()
});
static PORT_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d{2,5}\b").unwrap());
static TEMP_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/tmp/[\w.\-]+|tmp[\w.\-]*\.tmp").unwrap());

/// Strip volatile substrings from a raw failure reason so two runs of the
/// same underlying break produce the same signature.
pub fn normalize_reason(reason: &str) -> String {
    let mut s = reason.to_string();
    for re in [
        &*TEMP_PATH,
        &*UUID,
        &*MEMORY_ADDR,
        &*WINDOWS_PATH,
        &*POSIX_PATH,
        &*PORT_NUMBER,
        &*LINE_NUMBER,
        &*ISO_DATE,
        &*ISO_TIME,
    ] {
        s = re.replace_all(&s, "\u{2022}").to_string();
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the failure signature for (repository, branch, reason).
pub fn signature_for(repository: &str, branch: &str, reason: &str) -> FailureSignature {
    let normalized = normalize_reason(reason);
    FailureSignature::new(repository, branch, &normalized)
}

/// Outcome of feeding an event to the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Remediation may proceed.
    Allow,
    /// Remediation must not proceed; the circuit is open.
    Deny,
}

/// Evaluate whether an attempt is currently admitted, applying the
/// OPEN → HALF_OPEN clock transition as a side effect if due.
pub fn admit(state: &mut CircuitState, now: DateTime<Utc>) -> Admission {
    if let CircuitStatus::Open = state.state {
        if let Some(auto_reset_at) = state.auto_reset_at {
            if now >= auto_reset_at {
                state.record_transition(CircuitStatus::HalfOpen, "auto_reset_at reached", "scheduler", now);
                return Admission::Allow;
            }
        }
        return Admission::Deny;
    }
    Admission::Allow
}

/// Record a failed remediation attempt against the breaker.
pub fn record_failure(state: &mut CircuitState, now: DateTime<Utc>, threshold: u32, reset_after: Duration) {
    state.last_failure_at = Some(now);
    match state.state {
        CircuitStatus::Closed => {
            state.failure_count += 1;
            if state.failure_count >= threshold {
                state.opened_at = Some(now);
                state.auto_reset_at = Some(now + reset_after);
                state.record_transition(CircuitStatus::Open, "failure threshold reached", "breaker", now);
            }
        }
        CircuitStatus::HalfOpen => {
            state.opened_at = Some(now);
            state.auto_reset_at = Some(now + reset_after);
            state.record_transition(CircuitStatus::Open, "probe attempt failed", "breaker", now);
        }
        CircuitStatus::Open => {
            // `admit` denies attempts while open, so this shouldn't occur
            // in practice; extend the cooldown defensively if it does.
            state.auto_reset_at = Some(now + reset_after);
        }
    }
}

/// Record a successful remediation attempt, closing the circuit if it was
/// half-open and clearing the failure count either way.
pub fn record_success(state: &mut CircuitState, now: DateTime<Utc>) {
    let was_half_open = state.state == CircuitStatus::HalfOpen;
    state.failure_count = 0;
    state.opened_at = None;
    state.auto_reset_at = None;
    if state.state != CircuitStatus::Closed {
        state.record_transition(
            CircuitStatus::Closed,
            if was_half_open { "probe succeeded" } else { "success" },
            "breaker",
            now,
        );
    }
}

/// Manually reset the breaker to CLOSED, e.g. from an operator action.
pub fn manual_reset(state: &mut CircuitState, now: DateTime<Utc>, actor: &str) {
    state.failure_count = 0;
    state.opened_at = None;
    state.auto_reset_at = None;
    if state.state != CircuitStatus::Closed {
        state.record_transition(CircuitStatus::Closed, "manual reset", actor, now);
    }
}
