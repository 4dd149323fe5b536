//! Query path: expansion, oversampled vector search, rerank, top-k.

use std::sync::Arc;
use std::time::Duration;

use codelens_llm::{EmbedFn, LlmError, LlmProvider, Reranker};
use crate::error::{IndexError, Result};
use crate::expander::QueryExpander;
use crate::store::{SearchResult, VectorIndex};

/// Retrieval configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    /// Candidates fetched from the index before reranking (default: 20).
    pub pool_size: usize,
    /// Results returned after reranking (default: 5).
    pub top_k: usize,
    /// Ask the generative model for extra keywords before searching.
    pub expansion: bool,
    pub expansion_timeout: Duration,
    /// Limit on reranking the pool. On expiry the query fails, but the scoring
    /// task keeps its blocking thread until the reranker returns.
    pub rerank_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pool_size: 20,
            top_k: 5,
            expansion: true,
            expansion_timeout: Duration::from_secs(5),
            rerank_timeout: Duration::from_secs(10),
        }
    }
}

/// Expands, searches and reranks against one collection.
pub struct Retriever<P> {
    index: VectorIndex,
    embed: EmbedFn,
    expander: Option<QueryExpander<P>>,
    reranker: Arc<dyn Reranker>,
    config: RetrievalConfig,
}

impl<P> std::fmt::Debug for Retriever<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("index", &self.index)
            .field("reranker", &self.reranker.name())
            .field("expansion", &self.expander.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> Retriever<P> {
    /// `generator` drives query expansion; pass `None` to search with the raw query only.
    #[must_use]
    pub fn new(
        index: VectorIndex,
        embed: EmbedFn,
        generator: Option<Arc<P>>,
        reranker: Arc<dyn Reranker>,
        config: RetrievalConfig,
    ) -> Self {
        let expander = generator
            .filter(|_| config.expansion)
            .map(|p| QueryExpander::new(p, config.expansion_timeout));
        Self {
            index,
            embed,
            expander,
            reranker,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Up to `top_k` results ordered by rerank score, best first.
    ///
    /// The reranker sees the literal `raw_query`; the expansion only widens
    /// the vector search.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or search fails, or if reranking fails or
    /// exceeds its timeout.
    pub async fn retrieve(&self, raw_query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let expansion = match &self.expander {
            Some(expander) => expander.expand(raw_query).await,
            None => String::new(),
        };
        let combined = if expansion.is_empty() {
            raw_query.to_owned()
        } else {
            format!("{raw_query} {expansion}")
        };

        let pool = self
            .index
            .query(&combined, &self.embed, self.config.pool_size)
            .await?;
        tracing::debug!(
            collection = self.index.collection(),
            pool = pool.len(),
            expanded = !expansion.is_empty(),
            "candidate pool fetched"
        );
        if pool.is_empty() {
            return Ok(pool);
        }

        let scores = self.rerank(raw_query, &pool).await?;
        Ok(rank_pool(pool, &scores, top_k))
    }

    async fn rerank(&self, query: &str, pool: &[SearchResult]) -> Result<Vec<f32>> {
        let reranker = Arc::clone(&self.reranker);
        let query = query.to_owned();
        let documents: Vec<String> = pool.iter().map(|r| r.content.clone()).collect();
        let expected = documents.len();

        let task = tokio::task::spawn_blocking(move || reranker.score(&query, &documents));
        let scores = tokio::time::timeout(self.config.rerank_timeout, task)
            .await
            .map_err(|_| IndexError::Timeout {
                operation: "rerank",
            })???;

        if scores.len() != expected {
            return Err(LlmError::Inference(format!(
                "{} returned {} scores for {expected} candidates",
                self.reranker.name(),
                scores.len()
            ))
            .into());
        }
        Ok(scores)
    }
}

/// Attach `scores` to `pool` and keep the best `top_k`.
///
/// Ordering: rerank score descending (NaN last), then similarity descending,
/// then original pool position.
#[must_use]
pub fn rank_pool(pool: Vec<SearchResult>, scores: &[f32], top_k: usize) -> Vec<SearchResult> {
    let mut ranked: Vec<SearchResult> = pool
        .into_iter()
        .zip(scores.iter().copied())
        .map(|(result, score)| SearchResult {
            rerank_score: Some(score),
            ..result
        })
        .collect();

    let key = |r: &SearchResult| match r.rerank_score {
        Some(s) if !s.is_nan() => s,
        _ => f32::NEG_INFINITY,
    };
    ranked.sort_by(|a, b| {
        key(b)
            .total_cmp(&key(a))
            .then_with(|| b.similarity.total_cmp(&a.similarity))
    });
    ranked.truncate(top_k);
    ranked
}
