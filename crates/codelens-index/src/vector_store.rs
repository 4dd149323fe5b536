//! Backend-neutral vector storage seam.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("scroll error: {0}")]
    Scroll(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Search hit. `distance` is cosine distance: 0 for identical direction, up to 2.
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub distance: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Named collections of fixed-dimension vectors with JSON payloads.
///
/// Upserts replace points with the same id. Searches return hits ordered by
/// ascending distance.
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing. A no-op when it already exists.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Number of points in the collection; 0 when it does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;

    /// Every point id in the collection; empty when it does not exist.
    fn list_ids(&self, collection: &str) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>>;

    /// Human-readable description of where vectors live.
    fn location(&self) -> String;
}

/// Cosine distance, `1 - cos(a, b)`. Zero vectors are treated as orthogonal.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Order hits nearest first and keep `limit` of them.
pub(crate) fn nearest(mut hits: Vec<ScoredVectorPoint>, limit: u64) -> Vec<ScoredVectorPoint> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    hits
}
