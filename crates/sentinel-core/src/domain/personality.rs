//! `PersonalityProfile` — per-repository behavioral statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A detected behavioral pattern with a confidence adjustment and an
/// operator-facing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: DetectedPatternKind,
    pub frequency: f64,
    pub confidence_adjust: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedPatternKind {
    FlakyProne,
    FridaySpike,
    CategorySpecialist,
    TimeOfDay,
}

/// Trailing-30-day behavioral statistics for one repository, recomputed on
/// demand and cached with a short TTL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub repository: String,
    pub total_failures: u64,
    pub category_histogram: HashMap<String, u64>,
    pub day_of_week_histogram: [u64; 7],
    pub hour_histogram: [u64; 24],
    pub flaky_rate: f64,
    pub avg_resolution_minutes: f64,
    pub success_rate: f64,
    pub detected_patterns: Vec<DetectedPattern>,
    pub computed_at: DateTime<Utc>,
}

impl PersonalityProfile {
    pub fn empty(repository: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            repository: repository.into(),
            total_failures: 0,
            category_histogram: HashMap::new(),
            day_of_week_histogram: [0; 7],
            hour_histogram: [0; 24],
            flaky_rate: 0.0,
            avg_resolution_minutes: 0.0,
            success_rate: 1.0,
            detected_patterns: Vec::new(),
            computed_at: now,
        }
    }

    /// The category with the highest count, if any failures were recorded.
    pub fn dominant_category(&self) -> Option<(&String, u64)> {
        self.category_histogram
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(cat, count)| (cat, *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_has_no_dominant_category() {
        let p = PersonalityProfile::empty("acme/widgets", Utc::now());
        assert_eq!(p.dominant_category(), None);
    }

    #[test]
    fn dominant_category_picks_max() {
        let mut p = PersonalityProfile::empty("acme/widgets", Utc::now());
        p.category_histogram.insert("flaky_test".into(), 3);
        p.category_histogram.insert("dependency_resolution".into(), 9);
        assert_eq!(
            p.dominant_category(),
            Some((&"dependency_resolution".to_string(), 9))
        );
    }
}
