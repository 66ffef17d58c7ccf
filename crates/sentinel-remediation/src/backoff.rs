//! Exponential backoff with full jitter, shared by the Poller's rate-limit
//! handling and the Classifier's retryable-error policy.

use std::time::Duration;

use rand::Rng;

/// Full-jitter exponential backoff: `sleep ~ Uniform(0, min(cap, base * 2^attempt))`.
/// `attempt` is zero-based (the delay before the *first* retry uses `attempt = 0`).
pub fn full_jitter(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let exp = base.as_millis().saturating_mul(1u128 << attempt.min(20));
    let bound = exp.min(cap.as_millis()).max(1) as u64;
    let sleep_ms = rand::thread_rng().gen_range(0..=bound);
    Duration::from_millis(sleep_ms)
}
