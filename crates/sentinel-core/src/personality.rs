//! `PersonalityProfiler` — computes the trailing-30-day
//! [`PersonalityProfile`](crate::domain::PersonalityProfile) for a
//! repository and the confidence-adjustment flags derived from it.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::{DetectedPattern, DetectedPatternKind, PersonalityProfile};

const FLAKY_RATE_THRESHOLD: f64 = 0.3;
const FRIDAY_SPIKE_THRESHOLD: f64 = 0.4;
const CATEGORY_SPECIALIST_THRESHOLD: f64 = 0.5;
const TIME_OF_DAY_THRESHOLD: f64 = 0.3;
const FRIDAY: u32 = 4; // chrono::Weekday::Fri as an index into a Mon=0 histogram

/// One historical failure, as read from `Store::list_failures` joined
/// against its resolution outcome.
#[derive(Debug, Clone)]
pub struct FailureSample {
    pub category: String,
    pub occurred_at: DateTime<Utc>,
    pub resolution_minutes: Option<f64>,
    pub succeeded: bool,
}

/// Recompute a repository's behavioral profile from its trailing-window
/// failure samples. Callers are responsible for windowing (e.g. last 30
/// days) and for caching the result with a short TTL.
pub fn compute_profile(repository: &str, samples: &[FailureSample], now: DateTime<Utc>) -> PersonalityProfile {
    let mut profile = PersonalityProfile::empty(repository, now);
    profile.total_failures = samples.len() as u64;

    if samples.is_empty() {
        return profile;
    }

    let mut resolved_total = 0.0;
    let mut resolved_count = 0u64;
    let mut succeeded_count = 0u64;
    let mut flaky_count = 0u64;
    let mut friday_count = 0u64;

    for sample in samples {
        *profile.category_histogram.entry(sample.category.clone()).or_insert(0) += 1;
        let weekday = sample.occurred_at.weekday().num_days_from_monday();
        profile.day_of_week_histogram[weekday as usize] += 1;
        profile.hour_histogram[sample.occurred_at.hour() as usize] += 1;

        if let Some(minutes) = sample.resolution_minutes {
            resolved_total += minutes;
            resolved_count += 1;
        }
        if sample.succeeded {
            succeeded_count += 1;
        }
        if sample.category == "flaky_test" {
            flaky_count += 1;
        }
        if weekday == FRIDAY {
            friday_count += 1;
        }
    }

    let total = samples.len() as f64;
    profile.flaky_rate = flaky_count as f64 / total;
    profile.success_rate = succeeded_count as f64 / total;
    profile.avg_resolution_minutes = if resolved_count > 0 {
        resolved_total / resolved_count as f64
    } else {
        0.0
    };

    profile.detected_patterns = detect_patterns(&profile, friday_count as f64 / total);
    profile
}

fn detect_patterns(profile: &PersonalityProfile, friday_rate: f64) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();

    if profile.flaky_rate >= FLAKY_RATE_THRESHOLD {
        patterns.push(DetectedPattern {
            kind: DetectedPatternKind::FlakyProne,
            frequency: profile.flaky_rate,
            confidence_adjust: -0.1,
            recommendation: "stabilize flaky tests before trusting auto-remediation confidence here".into(),
        });
    }

    if friday_rate >= FRIDAY_SPIKE_THRESHOLD {
        patterns.push(DetectedPattern {
            kind: DetectedPatternKind::FridaySpike,
            frequency: friday_rate,
            confidence_adjust: -0.05,
            recommendation: "expect elevated Friday failure volume; consider tighter gating that day".into(),
        });
    }

    if let Some((category, count)) = profile.dominant_category() {
        let share = count as f64 / profile.total_failures.max(1) as f64;
        if share >= CATEGORY_SPECIALIST_THRESHOLD {
            patterns.push(DetectedPattern {
                kind: DetectedPatternKind::CategorySpecialist,
                frequency: share,
                confidence_adjust: 0.1,
                recommendation: format!("this repository's failures are dominated by {category}; prioritize precedent from that category"),
            });
        }
    }

    if let Some((hour, share)) = dominant_hour_share(profile) {
        if share >= TIME_OF_DAY_THRESHOLD {
            patterns.push(DetectedPattern {
                kind: DetectedPatternKind::TimeOfDay,
                frequency: share,
                confidence_adjust: 0.0,
                recommendation: format!("failures cluster around hour {hour} UTC; consider this when estimating staleness"),
            });
        }
    }

    patterns
}

fn dominant_hour_share(profile: &PersonalityProfile) -> Option<(usize, f64)> {
    if profile.total_failures == 0 {
        return None;
    }
    profile
        .hour_histogram
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .map(|(hour, count)| (hour, *count as f64 / profile.total_failures as f64))
}

/// Clamp a confidence adjustment (from `PersonalityProfile::detected_patterns`)
/// to the documented ±20 absolute percentage point bound before applying it
/// to a raw model confidence.
pub fn clamp_confidence_adjustment(raw: f64) -> f64 {
    raw.clamp(-0.20, 0.20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(category: &str, occurred_at: DateTime<Utc>, succeeded: bool) -> FailureSample {
        FailureSample {
            category: category.to_string(),
            occurred_at,
            resolution_minutes: Some(10.0),
            succeeded,
        }
    }

    #[test]
    fn empty_samples_yield_empty_profile() {
        let profile = compute_profile("acme/widgets", &[], Utc::now());
        assert_eq!(profile.total_failures, 0);
        assert!(profile.detected_patterns.is_empty());
    }

    #[test]
    fn high_flaky_rate_is_flagged() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(); // Monday
        let samples: Vec<_> = (0..10)
            .map(|i| sample_at(if i < 4 { "flaky_test" } else { "dependency_resolution" }, now, true))
            .collect();
        let profile = compute_profile("acme/widgets", &samples, now);
        assert!(profile.flaky_rate >= FLAKY_RATE_THRESHOLD);
        assert!(profile
            .detected_patterns
            .iter()
            .any(|p| p.kind == DetectedPatternKind::FlakyProne));
    }

    #[test]
    fn friday_spike_is_flagged() {
        let friday = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(); // Friday
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let mut samples = vec![sample_at("dependency_resolution", friday, true); 5];
        samples.extend(vec![sample_at("dependency_resolution", monday, true); 2]);
        let profile = compute_profile("acme/widgets", &samples, friday);
        assert!(profile
            .detected_patterns
            .iter()
            .any(|p| p.kind == DetectedPatternKind::FridaySpike));
    }

    #[test]
    fn confidence_adjustment_clamped_to_twenty_points() {
        assert_eq!(clamp_confidence_adjustment(0.5), 0.20);
        assert_eq!(clamp_confidence_adjustment(-0.5), -0.20);
        assert_eq!(clamp_confidence_adjustment(0.1), 0.1);
    }
}
