use std::str::FromStr;

use serde::de::DeserializeOwned;

use super::Config;

/// Parse `key` with [`FromStr`]; invalid values are logged and ignored.
fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

/// Parse `key` as the serde name of a unit enum variant.
fn variant<T: DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_backends();
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_timeouts();
    }

    fn apply_env_overrides_backends(&mut self) {
        if let Ok(v) = std::env::var("CODELENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(backend) = variant("CODELENS_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }
        if let Ok(v) = std::env::var("CODELENS_STORAGE_PATH") {
            self.storage.path = v;
        }
        if let Ok(v) = std::env::var("CODELENS_QDRANT_URL") {
            self.storage.qdrant_url = v;
        }
        if let Some(backend) = variant("CODELENS_RERANK_BACKEND") {
            self.rerank.backend = backend;
        }
        if let Ok(v) = std::env::var("CODELENS_RERANK_MODEL") {
            self.rerank.model = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = parsed("CODELENS_CHUNK_MAX_CHARS") {
            self.chunker.max_chars = n;
        }
        if let Some(n) = parsed("CODELENS_CHUNK_OVERLAP_CHARS") {
            self.chunker.overlap_chars = n;
        }
        if let Some(n) = parsed("CODELENS_INDEX_BATCH_SIZE") {
            self.index.batch_size = n;
        }
        if let Some(n) = parsed("CODELENS_INDEX_EMBED_CONCURRENCY") {
            self.index.embed_concurrency = n;
        }
        if let Some(n) = parsed("CODELENS_RETRIEVAL_POOL_SIZE") {
            self.retrieval.pool_size = n;
        }
        if let Some(n) = parsed("CODELENS_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = n;
        }
        if let Some(enabled) = parsed("CODELENS_RETRIEVAL_EXPANSION") {
            self.retrieval.expansion = enabled;
        }
    }

    fn apply_env_overrides_timeouts(&mut self) {
        if let Some(secs) = parsed("CODELENS_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_seconds = secs;
        }
        if let Some(ms) = parsed("CODELENS_TIMEOUT_EXPANSION_MS") {
            self.timeouts.expansion_ms = ms;
        }
        if let Some(secs) = parsed("CODELENS_TIMEOUT_RERANK") {
            self.timeouts.rerank_seconds = secs;
        }
        if let Some(secs) = parsed("CODELENS_TIMEOUT_ANSWER") {
            self.timeouts.answer_seconds = secs;
        }
    }
}
