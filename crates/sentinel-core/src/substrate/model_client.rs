//! `ModelClient` — the LLM used by the classifier to analyze a failure and
//! propose a fix. A thin port: callers own the real implementation (HTTP
//! to a hosted endpoint, a local runtime, whatever); this workspace only
//! needs the trait and a deterministic fake for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A chat-completion endpoint, with an optional embedding capability for
/// the pattern-memory similarity index.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Returns `None` when the client has no embedding endpoint configured;
    /// callers fall back to the deterministic hashed-token embedding in
    /// that case.
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>> {
        Ok(None)
    }
}

/// A scripted fake for classifier and gate tests: returns queued
/// responses in order, or an error once the queue is exhausted.
pub struct StubModelClient {
    responses: std::sync::Mutex<std::collections::VecDeque<CompletionResponse>>,
}

impl StubModelClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse {
            content: content.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }])
    }
}

#[async_trait]
impl ModelClient for StubModelClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        self.responses
            .lock()
            .expect("stub model client mutex poisoned")
            .pop_front()
            .ok_or_else(|| crate::error::CoreError::UpstreamRejected("stub queue exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_returns_queued_responses_in_order() {
        let stub = StubModelClient::new(vec![
            CompletionResponse {
                content: "first".into(),
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            CompletionResponse {
                content: "second".into(),
                prompt_tokens: 1,
                completion_tokens: 1,
            },
        ]);
        let req = CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.0,
            max_tokens: 10,
        };
        assert_eq!(stub.complete(req.clone()).await.unwrap().content, "first");
        assert_eq!(stub.complete(req).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn stub_errors_once_exhausted() {
        let stub = StubModelClient::new(vec![]);
        let req = CompletionRequest {
            messages: vec![],
            temperature: 0.0,
            max_tokens: 10,
        };
        assert!(stub.complete(req).await.is_err());
    }
}
