mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use codelens_index::chunker::ChunkerConfig;
use codelens_index::indexer::IndexerConfig;
use codelens_index::languages::LanguageStrategyMap;
use codelens_index::retriever::RetrievalConfig;
use codelens_index::scanner::{IgnoreRules, ScannerConfig};
use codelens_index::store::VectorIndexConfig;
use codelens_llm::retry::RetryPolicy;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunker.max_chars == 0 {
            bail!("chunker.max_chars must be greater than 0");
        }
        if self.chunker.overlap_chars >= self.chunker.max_chars {
            bail!(
                "chunker.overlap_chars ({}) must be smaller than chunker.max_chars ({})",
                self.chunker.overlap_chars,
                self.chunker.max_chars
            );
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be greater than 0");
        }
        if self.index.embed_concurrency == 0 {
            bail!("index.embed_concurrency must be greater than 0");
        }
        if self.retrieval.pool_size == 0 {
            bail!("retrieval.pool_size must be greater than 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        Ok(())
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        let defaults = IgnoreRules::default();
        let rules = IgnoreRules::new(
            defaults
                .dirs
                .into_iter()
                .chain(self.scan.extra_ignored_dirs.iter().cloned()),
            defaults
                .files
                .into_iter()
                .chain(self.scan.extra_ignored_files.iter().cloned()),
        );

        IndexerConfig {
            rules,
            strategies: LanguageStrategyMap::default()
                .with_generic_extensions(&self.scan.extra_extensions),
            scanner: ScannerConfig {
                respect_gitignore: self.scan.respect_gitignore,
                max_file_bytes: Some(self.scan.max_file_bytes),
            },
            chunker: ChunkerConfig {
                max_chars: self.chunker.max_chars,
                overlap_chars: self.chunker.overlap_chars,
            },
            index: VectorIndexConfig {
                batch_size: self.index.batch_size,
                embed_concurrency: self.index.embed_concurrency,
                retry: RetryPolicy {
                    max_retries: self.index.max_retries,
                    base_delay: Duration::from_millis(self.index.retry_base_ms),
                },
                embed_timeout: Duration::from_secs(self.timeouts.embedding_seconds),
            },
        }
    }

    #[must_use]
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            pool_size: self.retrieval.pool_size,
            top_k: self.retrieval.top_k,
            expansion: self.retrieval.expansion,
            expansion_timeout: Duration::from_millis(self.timeouts.expansion_ms),
            rerank_timeout: Duration::from_secs(self.timeouts.rerank_seconds),
        }
    }
}

/// `--config`, then `CODELENS_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Ok(path) = std::env::var("CODELENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
