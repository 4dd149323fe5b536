//! Single-file `SQLite` [`VectorStore`] with brute-force cosine search.
//!
//! Vectors are stored as little-endian `f32` blobs, payloads as JSON text.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, cosine_distance,
    nearest,
};

#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    path: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the database
    /// cannot be opened, or migrations fail.
    pub async fn open(path: &str) -> Result<Self> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_owned()
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is a separate database.
        let mut pool_opts = SqlitePoolOptions::new().max_connections(4);
        if in_memory {
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(opts).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(path, "opened SQLite vector store");

        Ok(Self {
            pool,
            path: path.to_owned(),
        })
    }

    async fn vector_size(&self, collection: &str) -> std::result::Result<Option<u64>, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT vector_size FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(size,)| u64::try_from(size).ok()))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = i64::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            sqlx::query("INSERT OR IGNORE INTO collections (name, vector_size) VALUES (?, ?)")
                .bind(&collection)
                .bind(size)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn collection_exists(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, std::result::Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.vector_size(&collection)
                .await
                .map(|size| size.is_some())
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn delete_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            sqlx::query("DELETE FROM collections WHERE name = ?")
                .bind(&collection)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let upsert_err = |e: sqlx::Error| VectorStoreError::Upsert(e.to_string());
            let expected = self
                .vector_size(&collection)
                .await
                .map_err(upsert_err)?
                .ok_or_else(|| {
                    VectorStoreError::Upsert(format!("collection {collection} not found"))
                })?;
            if let Some(bad) = points.iter().find(|p| p.vector.len() as u64 != expected) {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has {} dimensions, collection {collection} expects {expected}",
                    bad.id,
                    bad.vector.len(),
                )));
            }

            let mut tx = self.pool.begin().await.map_err(upsert_err)?;
            for p in points {
                let payload = serde_json::to_string(&p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO points (collection, id, vector, payload) VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, id) DO UPDATE SET vector = excluded.vector, payload = excluded.payload",
                )
                .bind(&collection)
                .bind(&p.id)
                .bind(encode_vector(&p.vector))
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(upsert_err)?;
            }
            tx.commit().await.map_err(upsert_err)?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, std::result::Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let search_err = |e: sqlx::Error| VectorStoreError::Search(e.to_string());
            if self.vector_size(&collection).await.map_err(search_err)?.is_none() {
                return Err(VectorStoreError::Search(format!(
                    "collection {collection} not found"
                )));
            }

            let rows: Vec<(String, Vec<u8>, String)> =
                sqlx::query_as("SELECT id, vector, payload FROM points WHERE collection = ?")
                    .bind(&collection)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(search_err)?;

            let mut hits = Vec::with_capacity(rows.len());
            for (id, blob, payload) in rows {
                let payload: HashMap<String, serde_json::Value> = serde_json::from_str(&payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                hits.push(ScoredVectorPoint {
                    id,
                    distance: cosine_distance(&vector, &decode_vector(&blob)),
                    payload,
                });
            }
            Ok(nearest(hits, limit))
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let delete_err = |e: sqlx::Error| VectorStoreError::Delete(e.to_string());
            let mut tx = self.pool.begin().await.map_err(delete_err)?;
            for id in &ids {
                sqlx::query("DELETE FROM points WHERE collection = ? AND id = ?")
                    .bind(&collection)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(delete_err)?;
            }
            tx.commit().await.map_err(delete_err)?;
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, std::result::Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM points WHERE collection = ?")
                .bind(&collection)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    fn list_ids(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, std::result::Result<Vec<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT id FROM points WHERE collection = ? ORDER BY id")
                    .bind(&collection)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }

    fn location(&self) -> String {
        format!("sqlite at {}", self.path)
    }
}
