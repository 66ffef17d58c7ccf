//! `PatternMemory` — similarity-based recall of past (failure → successful
//! fix) pairs, used to enrich the Classifier's prompt with precedent.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{EmbeddingFamily, Pattern};

const EMBEDDING_DIM: usize = 1536;
const SAME_CATEGORY_THRESHOLD: f32 = 0.75;
const CROSS_CATEGORY_THRESHOLD: f32 = 0.85;

/// A recalled pattern paired with its similarity to the query.
#[derive(Debug, Clone)]
pub struct Match {
    pub pattern: Pattern,
    pub similarity: f32,
}

/// Deterministic fallback embedding: hashes whitespace-separated tokens
/// into fixed-size buckets and L2-normalizes. Used whenever no model
/// embedding endpoint is configured; the family is recorded on the
/// `Pattern` so recall never mixes embedding spaces.
pub fn hashed_token_embedding(text: &str) -> Vec<f32> {
    let mut buckets = vec![0.0_f32; EMBEDDING_DIM];
    for token in text.split_whitespace() {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(&token.to_ascii_lowercase(), &mut hasher);
        let idx = (std::hash::Hasher::finish(&hasher) as usize) % EMBEDDING_DIM;
        buckets[idx] += 1.0;
    }
    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in &mut buckets {
            *b /= norm;
        }
    }
    buckets
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// An in-memory similarity index, warmed from the store at startup and
/// kept dual to it on every write.
#[derive(Default)]
pub struct PatternMemory {
    by_repository: RwLock<HashMap<String, Vec<Pattern>>>,
}

impl PatternMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load patterns into the index, e.g. from `Store::list_patterns` at
    /// startup. Does not itself write through to the store.
    pub fn warm(&self, patterns: Vec<Pattern>) {
        let mut by_repository = self.by_repository.write().expect("pattern memory lock poisoned");
        by_repository.clear();
        for pattern in patterns {
            by_repository.entry(pattern.repository.clone()).or_default().push(pattern);
        }
    }

    /// Index a single pattern, e.g. right after a successful write to the
    /// store.
    pub fn insert(&self, pattern: Pattern) {
        self.by_repository
            .write()
            .expect("pattern memory lock poisoned")
            .entry(pattern.repository.clone())
            .or_default()
            .push(pattern);
    }

    /// Recall the top-`k` patterns similar to `query_embedding` for a
    /// repository, applying the same-category / cross-category thresholds.
    /// Only patterns recorded with `query_family` are compared, since
    /// cosine similarity across embedding families is meaningless.
    pub fn similar(
        &self,
        repository: &str,
        category: &str,
        query_embedding: &[f32],
        query_family: EmbeddingFamily,
        k: usize,
    ) -> Vec<Match> {
        let by_repository = self.by_repository.read().expect("pattern memory lock poisoned");
        let Some(candidates) = by_repository.get(repository) else {
            return Vec::new();
        };

        let mut matches: Vec<Match> = candidates
            .iter()
            .filter(|p| p.embedding_family == query_family)
            .filter_map(|p| {
                let similarity = cosine_similarity(query_embedding, &p.embedding);
                let threshold = if p.category == category {
                    SAME_CATEGORY_THRESHOLD
                } else {
                    CROSS_CATEGORY_THRESHOLD
                };
                (similarity >= threshold).then(|| Match {
                    pattern: p.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(k);
        matches
    }
}
