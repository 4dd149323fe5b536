use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, cosine_distance,
    nearest,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    vector_size: u64,
    points: HashMap<String, StoredPoint>,
}

type Collections = HashMap<String, InMemoryCollection>;

/// Process-local store, used by tests and by `storage.backend = "memory"`.
pub struct InMemoryVectorStore {
    collections: RwLock<Collections>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Shared lock; a poisoned lock surfaces as `wrap(reason)`.
    fn read(
        &self,
        wrap: fn(String) -> VectorStoreError,
    ) -> Result<RwLockReadGuard<'_, Collections>, VectorStoreError> {
        self.collections.read().map_err(|e| wrap(e.to_string()))
    }

    fn write(
        &self,
        wrap: fn(String) -> VectorStoreError,
    ) -> Result<RwLockWriteGuard<'_, Collections>, VectorStoreError> {
        self.collections.write().map_err(|e| wrap(e.to_string()))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self.write(VectorStoreError::Collection)?;
            cols.entry(collection)
                .or_insert_with(|| InMemoryCollection {
                    vector_size,
                    points: HashMap::new(),
                });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self.read(VectorStoreError::Collection)?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self.write(VectorStoreError::Collection)?;
            cols.remove(&collection);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self.write(VectorStoreError::Upsert)?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points
                .iter()
                .find(|p| p.vector.len() as u64 != col.vector_size)
            {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has {} dimensions, collection {collection} expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.vector_size
                )));
            }
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self.read(VectorStoreError::Search)?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let hits = col
                .points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    distance: cosine_distance(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();
            Ok(nearest(hits, limit))
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut cols = self.write(VectorStoreError::Delete)?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Delete(format!("collection {collection} not found"))
            })?;
            for id in &ids {
                col.points.remove(id);
            }
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self.read(VectorStoreError::Collection)?;
            Ok(cols
                .get(&collection)
                .map_or(0, |col| col.points.len() as u64))
        })
    }

    fn list_ids(&self, collection: &str) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self.read(VectorStoreError::Scroll)?;
            let mut ids: Vec<String> = cols
                .get(&collection)
                .map(|col| col.points.keys().cloned().collect())
                .unwrap_or_default();
            ids.sort_unstable();
            Ok(ids)
        })
    }

    fn location(&self) -> String {
        "in-memory".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, source: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("source_path".into(), serde_json::json!(source))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("test").await.unwrap());
        store.ensure_collection("test", 3).await.unwrap();
        store.ensure_collection("test", 3).await.unwrap();
        assert!(store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store.delete_collection("test").await.unwrap();
        assert!(!store.collection_exists("test").await.unwrap());
        assert_eq!(store.count("test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_and_search_nearest_first() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert(
                "test",
                vec![
                    point("a", vec![1.0, 0.0, 0.0], "a.py"),
                    point("b", vec![0.0, 1.0, 0.0], "b.md"),
                ],
            )
            .await
            .unwrap();

        let results = store.search("test", vec![1.0, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!(results[0].distance < results[1].distance);
        assert_eq!(results[0].payload["source_path"], "a.py");
    }

    #[tokio::test]
    async fn upsert_same_id_replaces() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0, 0.0], "old.py")])
            .await
            .unwrap();
        store
            .upsert("test", vec![point("a", vec![0.0, 1.0], "new.py")])
            .await
            .unwrap();
        assert_eq!(store.count("test").await.unwrap(), 1);
        let hits = store.search("test", vec![0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].payload["source_path"], "new.py");
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        let err = store
            .upsert("test", vec![point("a", vec![1.0, 0.0], "a.py")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn search_missing_collection_errors() {
        let store = InMemoryVectorStore::new();
        assert!(store.search("nope", vec![1.0], 5).await.is_err());
    }

    #[tokio::test]
    async fn delete_by_ids_and_list() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert(
                "test",
                vec![
                    point("b", vec![1.0, 0.0], "x"),
                    point("a", vec![0.0, 1.0], "y"),
                    point("c", vec![1.0, 1.0], "z"),
                ],
            )
            .await
            .unwrap();
        store.delete_by_ids("test", vec!["b".into()]).await.unwrap();
        assert_eq!(store.list_ids("test").await.unwrap(), vec!["a", "c"]);
        assert!(store.list_ids("missing").await.unwrap().is_empty());
    }

    #[test]
    fn debug_and_location() {
        let store = InMemoryVectorStore::default();
        assert!(format!("{store:?}").contains("InMemoryVectorStore"));
        assert_eq!(store.location(), "in-memory");
    }
}
