//! Test-only mock provider and reranker.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{GenerationOptions, LlmProvider, Message};
use crate::rerank::Reranker;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<GenerationOptions>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Milliseconds to sleep before answering a chat request.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 8],
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Generation options seen by `chat`, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn recorded_options(&self) -> Vec<GenerationOptions> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(options.clone());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if self.supports_embeddings {
            Ok(self.embedding.clone())
        } else {
            Err(LlmError::EmbedUnsupported { provider: "mock" })
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

/// Reranker returning a fixed score per document, looked up by substring.
///
/// Documents matching no entry score `default_score`.
#[derive(Debug, Clone, Default)]
pub struct MockReranker {
    pub scores: Vec<(String, f32)>,
    pub default_score: f32,
    pub fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockReranker {
    #[must_use]
    pub fn with_scores(scores: Vec<(&str, f32)>) -> Self {
        Self {
            scores: scores
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queries this reranker was invoked with.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Reranker for MockReranker {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError> {
        self.calls.lock().unwrap().push(query.to_owned());
        if self.fail {
            return Err(LlmError::Inference("mock rerank error".into()));
        }
        Ok(documents
            .iter()
            .map(|doc| {
                self.scores
                    .iter()
                    .find(|(needle, _)| doc.contains(needle.as_str()))
                    .map_or(self.default_score, |(_, score)| *score)
            })
            .collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
