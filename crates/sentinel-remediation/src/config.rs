//! Layered configuration for the control loop: a TOML file deserialized
//! with serde, with optional per-repository overrides. Secrets never live
//! here — `sentinel-cli` and `sentineld` read those straight from the
//! environment and keep them out of this struct entirely.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RemediationError, Result};
use crate::orchestrator::OrchestratorConfig;

fn default_risk_threshold() -> u8 {
    5
}
fn default_approval_timeout_hours() -> i64 {
    24
}
fn default_polling_interval_minutes() -> u64 {
    5
}
fn default_snapshot_retention_days() -> i64 {
    7
}
fn default_health_check_delay_minutes() -> i64 {
    5
}
fn default_circuit_failure_threshold() -> u32 {
    3
}
fn default_circuit_auto_reset_hours() -> i64 {
    24
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_approval_environment() -> String {
    "prod-review".to_string()
}
fn default_notify_channel() -> String {
    "#ci-alerts".to_string()
}

/// Deserialized shape of `sentinel.toml`. Every field carries the default
/// from spec.md §6, so an empty file is a valid (if inert) config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: u8,
    pub protected_repositories: Vec<String>,
    #[serde(default = "default_approval_timeout_hours")]
    pub approval_timeout_hours: i64,
    #[serde(default = "default_polling_interval_minutes")]
    pub polling_interval_minutes: u64,
    #[serde(default = "default_snapshot_retention_days")]
    pub snapshot_retention_days: i64,
    #[serde(default = "default_health_check_delay_minutes")]
    pub health_check_delay_minutes: i64,
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_auto_reset_hours")]
    pub circuit_auto_reset_hours: i64,
    pub dry_run: bool,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_approval_environment")]
    pub approval_environment: String,
    pub reviewer_pool: Vec<String>,
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
    pub application_globs: Vec<String>,
    pub repositories: HashMap<String, RepositoryOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            risk_threshold: default_risk_threshold(),
            protected_repositories: Vec::new(),
            approval_timeout_hours: default_approval_timeout_hours(),
            polling_interval_minutes: default_polling_interval_minutes(),
            snapshot_retention_days: default_snapshot_retention_days(),
            health_check_delay_minutes: default_health_check_delay_minutes(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_auto_reset_hours: default_circuit_auto_reset_hours(),
            dry_run: false,
            default_branch: default_branch(),
            approval_environment: default_approval_environment(),
            reviewer_pool: Vec::new(),
            notify_channel: default_notify_channel(),
            application_globs: Vec::new(),
            repositories: HashMap::new(),
        }
    }
}

/// Per-repository overrides. `None` means "inherit the top-level value."
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryOverride {
    pub risk_threshold: Option<u8>,
    pub protected: Option<bool>,
    pub dry_run: Option<bool>,
    pub default_branch: Option<String>,
    pub approval_timeout_hours: Option<i64>,
    pub circuit_failure_threshold: Option<u32>,
    pub circuit_auto_reset_hours: Option<i64>,
    pub snapshot_retention_days: Option<i64>,
    pub health_check_delay_minutes: Option<i64>,
    pub approval_environment: Option<String>,
    pub reviewer_pool: Option<Vec<String>>,
    pub notify_channel: Option<String>,
    pub application_globs: Option<Vec<String>>,
}

impl Config {
    /// Read and parse `path`. Missing file or malformed TOML are both
    /// reported as [`RemediationError::Config`] rather than panicking —
    /// both `sentinel-cli` and `sentineld` turn this into an `anyhow`
    /// error with `.context(...)` at their boundary.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RemediationError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| RemediationError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// The full set of repositories this config manages: every key under
    /// `[repositories.*]` plus every name in `protected_repositories`
    /// (a protected repository needs no override block of its own to be
    /// managed). Order is stable only in that it's deduplicated;
    /// `sentineld` doesn't rely on iteration order.
    pub fn managed_repositories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.keys().cloned().collect();
        for repository in &self.protected_repositories {
            if !names.contains(repository) {
                names.push(repository.clone());
            }
        }
        names
    }

    /// Whether `repository` is configured as protected, either by name in
    /// `protected_repositories` or via its own override.
    pub fn is_protected(&self, repository: &str) -> bool {
        self.repositories
            .get(repository)
            .and_then(|over| over.protected)
            .unwrap_or_else(|| self.protected_repositories.iter().any(|r| r == repository))
    }

    /// Materialize the effective `OrchestratorConfig` for one repository,
    /// applying its override (if any) on top of the top-level defaults.
    pub fn orchestrator_config(&self, repository: &str) -> OrchestratorConfig {
        let over = self.repositories.get(repository).cloned().unwrap_or_default();
        OrchestratorConfig {
            repository: repository.to_string(),
            default_branch: over.default_branch.unwrap_or_else(|| self.default_branch.clone()),
            protected: self.is_protected(repository),
            application_globs: over.application_globs.unwrap_or_else(|| self.application_globs.clone()),
            dry_run: over.dry_run.unwrap_or(self.dry_run),
            risk_threshold: over.risk_threshold.unwrap_or(self.risk_threshold),
            circuit_failure_threshold: over.circuit_failure_threshold.unwrap_or(self.circuit_failure_threshold),
            circuit_auto_reset_hours: over.circuit_auto_reset_hours.unwrap_or(self.circuit_auto_reset_hours),
            approval_timeout_hours: over.approval_timeout_hours.unwrap_or(self.approval_timeout_hours),
            approval_environment: over.approval_environment.unwrap_or_else(|| self.approval_environment.clone()),
            reviewer_pool: over.reviewer_pool.unwrap_or_else(|| self.reviewer_pool.clone()),
            snapshot_retention_days: over.snapshot_retention_days.unwrap_or(self.snapshot_retention_days),
            health_check_delay_minutes: over.health_check_delay_minutes.unwrap_or(self.health_check_delay_minutes),
            notify_channel: over.notify_channel.unwrap_or_else(|| self.notify_channel.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_documented_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.risk_threshold, 5);
        assert_eq!(config.approval_timeout_hours, 24);
        assert_eq!(config.polling_interval_minutes, 5);
        assert_eq!(config.snapshot_retention_days, 7);
        assert_eq!(config.health_check_delay_minutes, 5);
        assert_eq!(config.circuit_failure_threshold, 3);
        assert_eq!(config.circuit_auto_reset_hours, 24);
        assert!(!config.dry_run);
    }

    #[test]
    fn repository_override_wins_over_top_level() {
        let toml = r#"
            risk_threshold = 5
            protected_repositories = ["acme/widgets"]

            [repositories."acme/widgets"]
            risk_threshold = 8
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let oc = config.orchestrator_config("acme/widgets");
        assert_eq!(oc.risk_threshold, 8);
        assert!(oc.protected);

        let other = config.orchestrator_config("acme/other");
        assert_eq!(other.risk_threshold, 5);
        assert!(!other.protected);
    }

    #[test]
    fn managed_repositories_unions_overrides_and_protected_list() {
        let toml = r#"
            protected_repositories = ["acme/widgets", "acme/legacy"]

            [repositories."acme/widgets"]
            risk_threshold = 8

            [repositories."acme/tooling"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let mut names = config.managed_repositories();
        names.sort();
        assert_eq!(names, vec!["acme/legacy", "acme/tooling", "acme/widgets"]);
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let err = Config::load(Path::new("/nonexistent/sentinel.toml")).unwrap_err();
        assert!(matches!(err, RemediationError::Config(_)));
    }
}
