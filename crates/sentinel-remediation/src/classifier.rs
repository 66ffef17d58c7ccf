//! `Classifier` — turns a `Failure` into an `Analysis` by assembling a
//! prompt, querying the `ModelClient`, and parsing the structured response.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use sentinel_core::domain::{
    Alternative, Analysis, DecisionKind, DecisionRecord, Effort, ErrorType, Failure, FixOperation,
    PersonalityProfile,
};
use sentinel_core::pattern_memory::hashed_token_embedding;
use sentinel_core::substrate::{ChatMessage, CompletionRequest, ModelClient};
use sentinel_core::{CoreError, PatternMemory};
use serde::Deserialize;
use tracing::{info, warn};

use crate::backoff::full_jitter;
use crate::error::{RemediationError, Result};

/// Top-k precedent patterns pulled into the prompt.
const HISTORY_K: usize = 3;
/// Bounded retries for retryable classification errors.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(60);

/// Placeholder category used to query `PatternMemory` before the failure's
/// own category is known; it never matches a stored pattern's category, so
/// recall always applies the stricter cross-category similarity threshold.
const UNCLASSIFIED_CATEGORY: &str = "_unclassified";

pub struct Classifier {
    model: Arc<dyn ModelClient>,
    patterns: Arc<PatternMemory>,
    model_id: String,
}

impl Classifier {
    pub fn new(model: Arc<dyn ModelClient>, patterns: Arc<PatternMemory>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            patterns,
            model_id: model_id.into(),
        }
    }

    /// Classify `failure`, returning the parsed `Analysis` and the
    /// `DecisionRecord` documenting the confidence adjustment applied.
    /// Retries retryable upstream errors up to `MAX_ATTEMPTS` times.
    pub async fn classify(&self, failure: &Failure, personality: &PersonalityProfile) -> Result<(Analysis, DecisionRecord)> {
        let family = sentinel_core::domain::EmbeddingFamily::HashedToken;
        let normalized_reason = sentinel_core::circuit_breaker::normalize_reason(&failure.failure_reason);
        let embedding = match self.model.embed(&normalized_reason).await {
            Ok(Some(vector)) => vector,
            _ => hashed_token_embedding(&normalized_reason),
        };
        let history = self
            .patterns
            .similar(&failure.repository, UNCLASSIFIED_CATEGORY, &embedding, family, HISTORY_K);

        let prompt = assemble_prompt(failure, &history, personality);

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            let request = CompletionRequest {
                messages: prompt.clone(),
                temperature: 0.2,
                max_tokens: 2048,
            };
            let started = std::time::Instant::now();
            match self.model.complete(request).await {
                Ok(response) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    return self.finish(failure, personality, &response.content, latency_ms);
                }
                Err(err @ (CoreError::UpstreamTimeout | CoreError::RateLimited { .. })) if attempt + 1 < MAX_ATTEMPTS => {
                    warn!(failure_id = %failure.failure_id, attempt, error = %err, "classification attempt failed, retrying");
                    tokio::time::sleep(full_jitter(RETRY_BASE, RETRY_CAP, attempt)).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(last_err.map(Into::into).unwrap_or(RemediationError::ParseExhausted("no attempts made".into())))
    }

    fn finish(
        &self,
        failure: &Failure,
        personality: &PersonalityProfile,
        content: &str,
        latency_ms: u64,
    ) -> Result<(Analysis, DecisionRecord)> {
        let raw = parse_response(content).ok_or_else(|| RemediationError::ParseExhausted(content.chars().take(200).collect()))?;

        let error_type = match raw.error_type.as_str() {
            "devops" => ErrorType::Devops,
            "developer" => ErrorType::Developer,
            _ => return Err(RemediationError::InvalidErrorType),
        };
        let effort = match raw.effort.as_str() {
            "low" => Effort::Low,
            "high" => Effort::High,
            _ => Effort::Med,
        };

        let raw_confidence = raw.confidence as f64 / 100.0;
        let adjustment: f64 = personality
            .detected_patterns
            .iter()
            .map(|p| p.confidence_adjust)
            .sum();
        let adjustment = sentinel_core::personality::clamp_confidence_adjustment(adjustment);
        let adjusted_confidence = Analysis::clamp_confidence(((raw_confidence + adjustment) * 100.0).round() as i64);

        let analysis = Analysis {
            failure_id: failure.failure_id,
            error_type,
            category: raw.category.clone(),
            risk_score: Analysis::clamp_risk(raw.risk_score),
            confidence: adjusted_confidence,
            effort,
            proposed_fix: raw.proposed_fix,
            files_to_modify: raw.files_to_modify,
            fix_operations: raw
                .fix_operations
                .into_iter()
                .map(|op| FixOperation {
                    path: op.path,
                    description: op.description,
                    new_content: op.new_content,
                })
                .collect(),
            reasoning: raw.reasoning,
            affected_components: raw.affected_components,
            model_id: self.model_id.clone(),
            response_latency_ms: latency_ms,
        };

        let decision = DecisionRecord::new(
            failure.failure_id,
            DecisionKind::Classification,
            format!("{}/{}", raw.category, raw.error_type),
            vec![Alternative {
                option: "raw_confidence".into(),
                score: raw_confidence,
                rejection_reason: format!("adjusted by personality profile: {adjustment:+.2}"),
            }],
            digest(content),
            adjusted_confidence,
            Utc::now(),
        );

        info!(
            failure_id = %failure.failure_id,
            category = %analysis.category,
            risk_score = analysis.risk_score,
            confidence = analysis.confidence,
            "failure classified"
        );

        Ok((analysis, decision))
    }
}

fn digest(content: &str) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn assemble_prompt(
    failure: &Failure,
    history: &[sentinel_core::pattern_memory::Match],
    personality: &PersonalityProfile,
) -> Vec<ChatMessage> {
    let role_preamble = "You are a CI failure triage assistant. Classify the failure and propose a \
        remediation. Respond with a single JSON object matching the schema described below. Do not \
        include any other prose.";

    let facts = format!(
        "Repository: {}\nBranch: {}\nWorkflow: {}\nCommit: {}\nFailure reason: {}\nLog tail:\n{}",
        failure.repository,
        failure.branch,
        failure.workflow_name,
        failure.commit_hash,
        failure.failure_reason,
        failure.captured_logs.chars().rev().take(4000).collect::<String>().chars().rev().collect::<String>(),
    );

    let history_block = if history.is_empty() {
        "No similar past fixes on record.".to_string()
    } else {
        history
            .iter()
            .map(|m| {
                format!(
                    "- signature={} fix=\"{}\" files={:?} (similarity {:.2})",
                    m.pattern.error_signature, m.pattern.proposed_fix, m.pattern.files_modified, m.similarity
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let dominant = personality
        .dominant_category()
        .map(|(cat, count)| format!("{cat} ({count} of {})", personality.total_failures))
        .unwrap_or_else(|| "none".to_string());
    let personality_block = format!(
        "Dominant category: {dominant}\nFlaky rate: {:.2}\nSuccess rate: {:.2}\nAdjustment hints: {}",
        personality.flaky_rate,
        personality.success_rate,
        personality
            .detected_patterns
            .iter()
            .map(|p| format!("{:?} ({:+.2})", p.kind, p.confidence_adjust))
            .collect::<Vec<_>>()
            .join(", "),
    );

    let schema = "Schema: {\"error_type\": \"devops\"|\"developer\", \"category\": string, \
        \"risk_score\": 0-10, \"confidence\": 0-100, \"effort\": \"low\"|\"med\"|\"high\", \
        \"proposed_fix\": string, \"files_to_modify\": [string], \"fix_operations\": \
        [{\"path\": string, \"description\": string, \"new_content\": string|null}], \"reasoning\": \
        string, \"affected_components\": [string]}";

    vec![
        ChatMessage::system(role_preamble),
        ChatMessage::user(facts),
        ChatMessage::user(format!("Historical context:\n{history_block}")),
        ChatMessage::user(format!("Repository personality:\n{personality_block}")),
        ChatMessage::user(schema),
    ]
}

#[derive(Debug, Deserialize)]
struct RawFixOperation {
    path: String,
    description: String,
    #[serde(default)]
    new_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    error_type: String,
    category: String,
    risk_score: i64,
    confidence: i64,
    #[serde(default = "default_effort")]
    effort: String,
    proposed_fix: String,
    #[serde(default)]
    files_to_modify: Vec<String>,
    #[serde(default)]
    fix_operations: Vec<RawFixOperation>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    affected_components: Vec<String>,
}

fn default_effort() -> String {
    "med".to_string()
}

/// Multi-strategy decode: strict parse, then lenient (strip code fences and
/// trailing commas), then regex field-by-field extraction.
fn parse_response(content: &str) -> Option<RawAnalysis> {
    if let Ok(raw) = serde_json::from_str::<RawAnalysis>(content) {
        return Some(raw);
    }

    let stripped = strip_code_fences(content);
    let lenient = strip_trailing_commas(&stripped);
    if let Ok(raw) = serde_json::from_str::<RawAnalysis>(&lenient) {
        return Some(raw);
    }

    regex_extract(&lenient)
}

fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

fn strip_trailing_commas(content: &str) -> String {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r",\s*([}\]])").unwrap());
    re.replace_all(content, "$1").to_string()
}

fn regex_extract(content: &str) -> Option<RawAnalysis> {
    let string_field = |name: &str| -> Option<String> {
        let re = Regex::new(&format!(r#""{name}"\s*:\s*"([^"]*)""#)).ok()?;
        re.captures(content).map(|c| c[1].to_string())
    };
    let int_field = |name: &str| -> Option<i64> {
        let re = Regex::new(&format!(r#""{name}"\s*:\s*(-?\d+)"#)).ok()?;
        re.captures(content).and_then(|c| c[1].parse().ok())
    };

    let error_type = string_field("error_type")?;
    let category = string_field("category")?;
    let risk_score = int_field("risk_score")?;
    let confidence = int_field("confidence")?;
    let proposed_fix = string_field("proposed_fix").unwrap_or_default();
    let effort = string_field("effort").unwrap_or_else(default_effort);
    let reasoning = string_field("reasoning").unwrap_or_default();

    Some(RawAnalysis {
        error_type,
        category,
        risk_score,
        confidence,
        effort,
        proposed_fix,
        files_to_modify: Vec::new(),
        fix_operations: Vec::new(),
        reasoning,
        affected_components: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::FailureStatus;
    use sentinel_core::substrate::model_client::StubModelClient;

    fn failure() -> Failure {
        Failure::new(
            "acme/widgets",
            "main",
            "build",
            "run-1",
            "deadbeef",
            "log tail",
            "npm install timeout",
            Utc::now(),
        )
    }

    fn valid_json() -> &'static str {
        r#"{"error_type":"devops","category":"dependency_resolution","risk_score":3,"confidence":80,
        "effort":"low","proposed_fix":"bump lockfile","files_to_modify":["package-lock.json"],
        "fix_operations":[],"reasoning":"transient npm registry timeout","affected_components":[]}"#
    }

    #[tokio::test]
    async fn strict_parse_succeeds() {
        let model = Arc::new(StubModelClient::with_content(valid_json()));
        let patterns = Arc::new(PatternMemory::new());
        let classifier = Classifier::new(model, patterns, "test-model");
        let profile = PersonalityProfile::empty("acme/widgets", Utc::now());
        let (analysis, _decision) = classifier.classify(&failure(), &profile).await.unwrap();
        assert_eq!(analysis.error_type, ErrorType::Devops);
        assert_eq!(analysis.risk_score, 3);
    }

    #[tokio::test]
    async fn lenient_parse_strips_code_fences_and_trailing_commas() {
        let fenced = format!("```json\n{{\"error_type\":\"devops\",\"category\":\"flaky_test\",\"risk_score\":2,\"confidence\":70,\"effort\":\"low\",\"proposed_fix\":\"retry\",\"files_to_modify\":[],\"fix_operations\":[],\"reasoning\":\"flaky\",\"affected_components\":[],}}\n```");
        let model = Arc::new(StubModelClient::with_content(fenced));
        let patterns = Arc::new(PatternMemory::new());
        let classifier = Classifier::new(model, patterns, "test-model");
        let profile = PersonalityProfile::empty("acme/widgets", Utc::now());
        let (analysis, _decision) = classifier.classify(&failure(), &profile).await.unwrap();
        assert_eq!(analysis.category, "flaky_test");
    }

    #[tokio::test]
    async fn invalid_error_type_is_rejected() {
        let content = r#"{"error_type":"unknown","category":"x","risk_score":1,"confidence":50,"effort":"low","proposed_fix":"","files_to_modify":[],"fix_operations":[],"reasoning":"","affected_components":[]}"#;
        let model = Arc::new(StubModelClient::with_content(content));
        let patterns = Arc::new(PatternMemory::new());
        let classifier = Classifier::new(model, patterns, "test-model");
        let profile = PersonalityProfile::empty("acme/widgets", Utc::now());
        assert!(classifier.classify(&failure(), &profile).await.is_err());
    }

    #[tokio::test]
    async fn garbage_response_exhausts_all_parse_strategies() {
        let model = Arc::new(StubModelClient::with_content("not json at all"));
        let patterns = Arc::new(PatternMemory::new());
        let classifier = Classifier::new(model, patterns, "test-model");
        let profile = PersonalityProfile::empty("acme/widgets", Utc::now());
        let err = classifier.classify(&failure(), &profile).await.unwrap_err();
        assert!(matches!(err, RemediationError::ParseExhausted(_)));
    }

    #[test]
    fn regex_field_extraction_recovers_core_fields() {
        let garbled = r#"here is your answer: "error_type": "developer", "category": "test_failure", "risk_score": 1, "confidence": 90 — hope that helps"#;
        let raw = regex_extract(garbled).unwrap();
        assert_eq!(raw.error_type, "developer");
        assert_eq!(raw.risk_score, 1);
    }

    #[test]
    fn failure_status_starts_detected() {
        assert_eq!(failure().status, FailureStatus::Detected);
    }
}
