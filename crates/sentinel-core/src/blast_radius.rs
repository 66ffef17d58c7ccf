//! `BlastRadius` — pre-change impact scoring for a proposed edit set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Qualitative banding of a numeric blast-radius score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
    Critical,
}

impl Level {
    fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Level::Critical
        } else if score >= 7.0 {
            Level::High
        } else if score >= 4.0 {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastRadiusScore {
    pub score: f64,
    pub level: Level,
    pub rationale: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Inputs to a blast-radius assessment.
pub struct BlastRadiusInput<'a> {
    pub branch: &'a str,
    pub default_branch: &'a str,
    pub files_to_modify: &'a [String],
    pub failure_category: &'a str,
}

fn file_criticality(path: &str) -> f64 {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with(".github/workflows/") || lower.ends_with(".yml") && lower.contains("workflow") {
        10.0
    } else if lower.ends_with("dockerfile") || lower.contains("docker-compose") {
        9.0
    } else if ["package.json", "package-lock.json", "cargo.toml", "cargo.lock", "go.mod", "go.sum", "requirements.txt", "pyproject.toml"]
        .iter()
        .any(|f| lower.ends_with(f))
    {
        7.0
    } else if lower.contains("/deploy/") || lower.contains("/terraform/") || lower.contains("/k8s/") || lower.contains("/infra/") {
        9.0
    } else if lower.ends_with(".env") || lower.ends_with(".env.production") {
        8.0
    } else {
        2.0
    }
}

fn service_root(path: &str) -> Option<&str> {
    path.split('/').next().filter(|s| !s.is_empty())
}

fn category_risk(category: &str) -> f64 {
    match category {
        "dependency_resolution" => 6.0,
        "infrastructure" | "deployment" => 9.0,
        "flaky_test" => 2.0,
        "configuration" => 5.0,
        _ => 4.0,
    }
}

fn branch_criticality(branch: &str, default_branch: &str) -> f64 {
    if branch == default_branch {
        10.0
    } else if branch.starts_with("release/") || branch.starts_with("release-") {
        7.0
    } else {
        3.0
    }
}

/// Compute the weighted blast-radius score for a proposed edit set.
/// Monotone: adding files, or raising any single input's severity, never
/// decreases the resulting score.
pub fn assess(input: &BlastRadiusInput<'_>) -> BlastRadiusScore {
    let file_score = input
        .files_to_modify
        .iter()
        .map(|f| file_criticality(f))
        .fold(0.0_f64, f64::max);

    let distinct_services: HashSet<&str> = input.files_to_modify.iter().filter_map(|f| service_root(f)).collect();
    let service_score = (distinct_services.len() as f64 * 2.5).min(10.0);

    let touches_dependency_manifest = input.files_to_modify.iter().any(|f| {
        let lower = f.to_ascii_lowercase();
        ["package.json", "package-lock.json", "cargo.toml", "cargo.lock", "go.mod", "go.sum"]
            .iter()
            .any(|m| lower.ends_with(m))
    });
    let dependency_score = if touches_dependency_manifest {
        (distinct_services.len().max(1) as f64 * 3.0).min(10.0)
    } else {
        0.0
    };

    let branch_score = branch_criticality(input.branch, input.default_branch);
    let category_score = category_risk(input.failure_category);

    let score = file_score * 0.30 + service_score * 0.25 + dependency_score * 0.20 + branch_score * 0.15 + category_score * 0.10;
    let level = Level::from_score(score);

    let mut rationale = vec![format!("file criticality {file_score:.1} (30%)"), format!("service impact {service_score:.1} (25%)")];
    if touches_dependency_manifest {
        rationale.push(format!("dependency manifest touched, impact {dependency_score:.1} (20%)"));
    }
    rationale.push(format!("branch criticality {branch_score:.1} (15%)"));
    rationale.push(format!("category risk {category_score:.1} (10%)"));

    let mut recommendations = Vec::new();
    if matches!(level, Level::High | Level::Critical) {
        recommendations.push("require human review before merge".to_string());
    }
    if touches_dependency_manifest {
        recommendations.push("run full dependency resolution in CI before merge".to_string());
    }
    if input.branch == input.default_branch {
        recommendations.push("prefer targeting a release or feature branch over the default branch".to_string());
    }

    BlastRadiusScore {
        score,
        level,
        rationale,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_file_on_default_branch_is_high_or_critical() {
        let input = BlastRadiusInput {
            branch: "main",
            default_branch: "main",
            files_to_modify: &[".github/workflows/ci.yml".to_string()],
            failure_category: "infrastructure",
        };
        let result = assess(&input);
        assert!(matches!(result.level, Level::High | Level::Critical));
    }

    #[test]
    fn adding_files_never_decreases_score() {
        let base = BlastRadiusInput {
            branch: "feature/x",
            default_branch: "main",
            files_to_modify: &["src/lib.rs".to_string()],
            failure_category: "flaky_test",
        };
        let base_score = assess(&base).score;

        let extended = BlastRadiusInput {
            branch: "feature/x",
            default_branch: "main",
            files_to_modify: &["src/lib.rs".to_string(), "package-lock.json".to_string()],
            failure_category: "flaky_test",
        };
        let extended_score = assess(&extended).score;

        assert!(extended_score >= base_score);
    }

    #[test]
    fn ordinary_source_change_on_feature_branch_is_low() {
        let input = BlastRadiusInput {
            branch: "feature/tweak",
            default_branch: "main",
            files_to_modify: &["src/util.rs".to_string()],
            failure_category: "flaky_test",
        };
        let result = assess(&input);
        assert!(matches!(result.level, Level::Low));
    }
}
