use std::time::Duration;

use codelens_index::retriever::RetrievalConfig;
use codelens_index::store::VectorIndexConfig;
use serde::{Deserialize, Serialize};

// Section defaults are read from the library configs.

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "qwen2.5-coder:7b".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Generative model for query expansion and answers.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sqlite,
    Qdrant,
}

fn default_storage_path() -> String {
    ".codelens/index.db".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection_prefix() -> String {
    codelens_index::collection::DEFAULT_PREFIX.into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// `SQLite` database file.
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            qdrant_url: default_qdrant_url(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub respect_gitignore: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Directory names pruned in addition to the built-in list.
    #[serde(default)]
    pub extra_ignored_dirs: Vec<String>,
    #[serde(default)]
    pub extra_ignored_files: Vec<String>,
    /// Extensions read with the generic strategy on top of the built-in map.
    #[serde(default)]
    pub extra_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: false,
            max_file_bytes: default_max_file_bytes(),
            extra_ignored_dirs: Vec::new(),
            extra_ignored_files: Vec::new(),
            extra_extensions: Vec::new(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}

fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChunkerSection {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_batch_size() -> usize {
    VectorIndexConfig::default().batch_size
}

fn default_embed_concurrency() -> usize {
    VectorIndexConfig::default().embed_concurrency
}

fn default_max_retries() -> u32 {
    VectorIndexConfig::default().retry.max_retries
}

fn default_retry_base_ms() -> u64 {
    millis(VectorIndexConfig::default().retry.base_delay)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            embed_concurrency: default_embed_concurrency(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_pool_size() -> usize {
    RetrievalConfig::default().pool_size
}

fn default_top_k() -> usize {
    RetrievalConfig::default().top_k
}

fn default_expansion() -> bool {
    RetrievalConfig::default().expansion
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalSection {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_expansion")]
    pub expansion: bool,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            top_k: default_top_k(),
            expansion: default_expansion(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankBackend {
    #[default]
    Lexical,
    /// Requires the `candle` feature.
    CrossEncoder,
}

fn default_rerank_model() -> String {
    "cross-encoder/ms-marco-MiniLM-L-6-v2".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub backend: RerankBackend,
    /// Hugging Face repository of the cross-encoder.
    #[serde(default = "default_rerank_model")]
    pub model: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            backend: RerankBackend::default(),
            model: default_rerank_model(),
        }
    }
}

fn default_embedding_timeout() -> u64 {
    VectorIndexConfig::default().embed_timeout.as_secs()
}

fn default_expansion_timeout_ms() -> u64 {
    millis(RetrievalConfig::default().expansion_timeout)
}

fn default_rerank_timeout() -> u64 {
    RetrievalConfig::default().rerank_timeout.as_secs()
}

fn default_answer_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_expansion_timeout_ms")]
    pub expansion_ms: u64,
    #[serde(default = "default_rerank_timeout")]
    pub rerank_seconds: u64,
    #[serde(default = "default_answer_timeout")]
    pub answer_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_seconds: default_embedding_timeout(),
            expansion_ms: default_expansion_timeout_ms(),
            rerank_seconds: default_rerank_timeout(),
            answer_seconds: default_answer_timeout(),
        }
    }
}
