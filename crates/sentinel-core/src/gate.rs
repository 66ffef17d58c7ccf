//! `SafetyGate` — composes circuit, repo policy, and risk signals into a
//! single allow/deny verdict for a proposed remediation.

use serde::{Deserialize, Serialize};

use crate::blast_radius::{BlastRadiusScore, Level as BlastLevel};
use crate::circuit_breaker::Admission;
use crate::domain::Analysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AutoApply,
    /// Auto-applied in appearance only; every side effect is intercepted.
    AutoApplySimulated,
    RequireApproval,
    Block,
}

impl Verdict {
    pub fn permits_auto_apply(self) -> bool {
        matches!(self, Verdict::AutoApply | Verdict::AutoApplySimulated)
    }
}

/// One gate's pass/fail outcome, attached verbatim to the decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate: String,
    pub passed: bool,
    pub reason: Option<String>,
}

impl GateOutcome {
    fn pass(gate: &str) -> Self {
        Self {
            gate: gate.to_string(),
            passed: true,
            reason: None,
        }
    }

    fn fail(gate: &str, reason: impl Into<String>) -> Self {
        Self {
            gate: gate.to_string(),
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub verdict: Verdict,
    pub outcomes: Vec<GateOutcome>,
}

/// Per-repository policy inputs to the gate.
pub struct GateConfig<'a> {
    pub risk_threshold: u8,
    pub protected: bool,
    pub application_globs: &'a [String],
    pub dry_run: bool,
}

impl Default for GateConfig<'_> {
    fn default() -> Self {
        Self {
            risk_threshold: 5,
            protected: false,
            application_globs: &[],
            dry_run: false,
        }
    }
}

fn matches_any_glob(path: &str, globs: &[String]) -> bool {
    globs.iter().any(|pattern| glob_match(pattern, path))
}

/// A minimal `*`/`**` glob matcher sufficient for path-prefix and
/// extension patterns; not a general glob implementation.
fn glob_match(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/**") {
        return path == prefix || path.starts_with(&format!("{prefix}/"));
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return path.ends_with(suffix);
    }
    pattern == path
}

/// Evaluate the safety gate. `circuit_admission` and `blast` are computed
/// by the caller (`circuit_breaker::admit`, `blast_radius::assess`) so
/// this function stays pure and easy to test against fixed inputs.
pub fn evaluate(
    analysis: &Analysis,
    files_to_modify: &[String],
    circuit_admission: Admission,
    blast: &BlastRadiusScore,
    config: &GateConfig<'_>,
) -> GateResult {
    let mut outcomes = Vec::new();

    if circuit_admission == Admission::Deny {
        outcomes.push(GateOutcome::fail("circuit", "circuit_open"));
        return GateResult {
            verdict: Verdict::Block,
            outcomes,
        };
    }
    outcomes.push(GateOutcome::pass("circuit"));

    if config.protected {
        outcomes.push(GateOutcome::fail("protected_repository", "repository is flagged protected"));
        return GateResult {
            verdict: Verdict::RequireApproval,
            outcomes,
        };
    }
    outcomes.push(GateOutcome::pass("protected_repository"));

    let touches_application_code = files_to_modify.iter().any(|f| matches_any_glob(f, config.application_globs));
    if touches_application_code {
        outcomes.push(GateOutcome::fail("application_code", "edit set touches application source"));
        return finalize(Verdict::RequireApproval, outcomes, config);
    }
    outcomes.push(GateOutcome::pass("application_code"));

    if analysis.risk_score >= config.risk_threshold {
        outcomes.push(GateOutcome::fail(
            "risk_threshold",
            format!("risk_score {} >= threshold {}", analysis.risk_score, config.risk_threshold),
        ));
        return finalize(Verdict::RequireApproval, outcomes, config);
    }
    outcomes.push(GateOutcome::pass("risk_threshold"));

    if matches!(blast.level, BlastLevel::Critical) || blast.score >= 10.0 {
        outcomes.push(GateOutcome::fail("blast_radius", format!("blast radius {:.1} at or above block threshold", blast.score)));
        return GateResult {
            verdict: Verdict::Block,
            outcomes,
        };
    }
    if blast.score >= 8.0 {
        outcomes.push(GateOutcome::fail("blast_radius", format!("blast radius {:.1} requires approval", blast.score)));
        return finalize(Verdict::RequireApproval, outcomes, config);
    }
    outcomes.push(GateOutcome::pass("blast_radius"));

    finalize(Verdict::AutoApply, outcomes, config)
}

fn finalize(verdict: Verdict, outcomes: Vec<GateOutcome>, config: &GateConfig<'_>) -> GateResult {
    if config.dry_run && verdict == Verdict::AutoApply {
        return GateResult {
            verdict: Verdict::AutoApplySimulated,
            outcomes,
        };
    }
    GateResult { verdict, outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Effort, ErrorType};

    fn analysis(risk_score: u8) -> Analysis {
        Analysis {
            failure_id: uuid::Uuid::new_v4(),
            error_type: ErrorType::Devops,
            category: "dependency_resolution".into(),
            risk_score,
            confidence: 80,
            effort: Effort::Low,
            proposed_fix: "bump lockfile".into(),
            files_to_modify: vec![],
            fix_operations: vec![],
            reasoning: String::new(),
            affected_components: vec![],
            model_id: "test-model".into(),
            response_latency_ms: 0,
        }
    }

    fn low_blast() -> BlastRadiusScore {
        BlastRadiusScore {
            score: 2.0,
            level: BlastLevel::Low,
            rationale: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn open_circuit_blocks_regardless_of_risk() {
        let result = evaluate(&analysis(0), &[], Admission::Deny, &low_blast(), &GateConfig::default());
        assert_eq!(result.verdict, Verdict::Block);
        assert_eq!(result.outcomes[0].reason.as_deref(), Some("circuit_open"));
    }

    #[test]
    fn protected_repo_always_requires_approval() {
        let config = GateConfig {
            protected: true,
            ..GateConfig::default()
        };
        let result = evaluate(&analysis(0), &[], Admission::Allow, &low_blast(), &config);
        assert_eq!(result.verdict, Verdict::RequireApproval);
    }

    #[test]
    fn risk_below_threshold_auto_applies() {
        let config = GateConfig::default();
        let result = evaluate(&analysis(4), &[], Admission::Allow, &low_blast(), &config);
        assert_eq!(result.verdict, Verdict::AutoApply);
    }

    #[test]
    fn risk_at_threshold_requires_approval() {
        let config = GateConfig::default();
        let result = evaluate(&analysis(5), &[], Admission::Allow, &low_blast(), &config);
        assert_eq!(result.verdict, Verdict::RequireApproval);
    }

    #[test]
    fn critical_blast_radius_blocks() {
        let blast = BlastRadiusScore {
            score: 10.0,
            level: BlastLevel::Critical,
            rationale: vec![],
            recommendations: vec![],
        };
        let result = evaluate(&analysis(0), &[], Admission::Allow, &blast, &GateConfig::default());
        assert_eq!(result.verdict, Verdict::Block);
    }

    #[test]
    fn dry_run_simulates_auto_apply() {
        let config = GateConfig {
            dry_run: true,
            ..GateConfig::default()
        };
        let result = evaluate(&analysis(0), &[], Admission::Allow, &low_blast(), &config);
        assert_eq!(result.verdict, Verdict::AutoApplySimulated);
    }

    #[test]
    fn application_code_glob_requires_approval() {
        let config = GateConfig {
            application_globs: &["src/**".to_string()],
            ..GateConfig::default()
        };
        let result = evaluate(
            &analysis(0),
            &["src/main.rs".to_string()],
            Admission::Allow,
            &low_blast(),
            &config,
        );
        assert_eq!(result.verdict, Verdict::RequireApproval);
    }
}
