//! One collection of embedded fragments on top of a [`VectorStore`] backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use codelens_llm::EmbedFn;
use codelens_llm::retry::{RetryPolicy, with_backoff, with_timeout};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::chunker::Fragment;
use crate::error::{IndexError, Result};
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore};

/// Upsert tuning.
#[derive(Debug, Clone, Copy)]
pub struct VectorIndexConfig {
    /// Fragments persisted per backend write (default: 100).
    pub batch_size: usize,
    /// Embedding calls in flight at once (default: 4).
    pub embed_concurrency: usize,
    pub retry: RetryPolicy,
    /// Deadline for a single embedding call, retries excluded.
    pub embed_timeout: Duration,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            embed_concurrency: 4,
            retry: RetryPolicy::default(),
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// One ranked hit. `similarity` is `1 - cosine distance`, clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub source: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub collection_name: String,
    pub total_records: u64,
    pub storage_location: String,
}

/// A named collection of fragments with their vectors.
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    collection: String,
    config: VectorIndexConfig,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("collection", &self.collection)
            .field("location", &self.store.location())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        config: VectorIndexConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            config,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and persist `fragments` in batches, replacing records with the same id.
    ///
    /// `on_batch` receives the number of fragments committed so far after each
    /// batch. Batches already written stay written when a later one fails.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails after retries, vectors disagree on
    /// dimension, or the backend rejects a write.
    pub async fn upsert_batch(
        &self,
        fragments: &[Fragment],
        embed: &EmbedFn,
        mut on_batch: impl FnMut(usize) + Send,
    ) -> Result<usize> {
        let mut dimension: Option<usize> = None;
        let mut committed = 0usize;

        for batch in fragments.chunks(self.config.batch_size.max(1)) {
            let pending: Vec<_> = batch
                .iter()
                .map(|fragment| self.embed_one(embed, &fragment.content))
                .collect();
            let vectors: Vec<Vec<f32>> = stream::iter(pending)
                .buffered(self.config.embed_concurrency.max(1))
                .try_collect()
                .await?;

            for vector in &vectors {
                match dimension {
                    None => {
                        self.store
                            .ensure_collection(&self.collection, u64::try_from(vector.len())?)
                            .await?;
                        dimension = Some(vector.len());
                    }
                    Some(expected) if expected != vector.len() => {
                        return Err(IndexError::DimensionMismatch {
                            expected,
                            actual: vector.len(),
                        });
                    }
                    Some(_) => {}
                }
            }

            let points = batch
                .iter()
                .zip(vectors)
                .map(|(fragment, vector)| {
                    Ok(VectorPoint {
                        id: fragment.id(),
                        vector,
                        payload: fragment_payload(fragment)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            self.store.upsert(&self.collection, points).await?;

            committed += batch.len();
            tracing::debug!(
                collection = %self.collection,
                committed,
                total = fragments.len(),
                "batch upserted"
            );
            on_batch(committed);
        }

        Ok(committed)
    }

    async fn embed_one(&self, embed: &EmbedFn, text: &str) -> Result<Vec<f32>> {
        let vector = with_backoff("embed", self.config.retry, || {
            with_timeout(self.config.embed_timeout, embed(text))
        })
        .await?;
        Ok(vector)
    }

    /// The `k` records nearest to `text`, best first.
    ///
    /// A missing or unreachable collection yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the search itself fails.
    pub async fn query(&self, text: &str, embed: &EmbedFn, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        match self.store.collection_exists(&self.collection).await {
            Ok(true) => {}
            Ok(false) => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(collection = %self.collection, error = %e, "collection unreachable");
                return Ok(Vec::new());
            }
        }
        let vector = self.embed_one(embed, text).await?;
        let hits = self
            .store
            .search(&self.collection, vector, u64::try_from(k)?)
            .await?;
        Ok(hits.into_iter().map(hit_to_result).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            collection_name: self.collection.clone(),
            total_records: self.store.count(&self.collection).await?,
            storage_location: self.store.location(),
        })
    }

    /// Delete every record whose id is not in `keep_ids`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub async fn prune(&self, keep_ids: &HashSet<String>) -> Result<usize> {
        let stale: Vec<String> = self
            .store
            .list_ids(&self.collection)
            .await?
            .into_iter()
            .filter(|id| !keep_ids.contains(id))
            .collect();
        let removed = stale.len();
        if removed > 0 {
            self.store.delete_by_ids(&self.collection, stale).await?;
            tracing::info!(collection = %self.collection, removed, "pruned stale fragments");
        }
        Ok(removed)
    }

    /// Drop the whole collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion.
    pub async fn delete(&self) -> Result<()> {
        if self.store.collection_exists(&self.collection).await? {
            self.store.delete_collection(&self.collection).await?;
            tracing::info!(collection = %self.collection, "collection deleted");
        }
        Ok(())
    }
}

fn fragment_payload(fragment: &Fragment) -> Result<HashMap<String, serde_json::Value>> {
    let mut payload: HashMap<String, serde_json::Value> =
        serde_json::from_value(serde_json::to_value(&fragment.metadata)?)?;
    payload.insert(
        "content".into(),
        serde_json::Value::String(fragment.content.clone()),
    );
    Ok(payload)
}

fn hit_to_result(hit: ScoredVectorPoint) -> SearchResult {
    let text = |key: &str| {
        hit.payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    SearchResult {
        content: text("content"),
        source: text("source_path"),
        similarity: (1.0 - hit.distance).clamp(0.0, 1.0),
        rerank_score: None,
    }
}
