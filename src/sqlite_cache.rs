//! Durable [`EmbeddingCache`] backed by SQLite.
//!
//! All cache keys share one `embedding_cache` table; each
//! [`SqliteEmbeddingCache`] reads and writes only the rows for its own key,
//! so vectors from different models never mix. A batch is written inside a
//! single transaction with `INSERT OR IGNORE`, so an interrupted fill leaves
//! either the whole batch or none of it, and re-running a fill never
//! rewrites an existing entry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use recall_harness_core::cache::EmbeddingCache;
use recall_harness_core::embedding::{blob_to_vec, vec_to_blob};
use recall_harness_core::models::EmbeddingRecord;

use crate::{db, migrate};

/// Ids per `IN (...)` lookup, well under SQLite's bound-parameter limit.
const LOOKUP_BATCH: usize = 500;

pub struct SqliteEmbeddingCache {
    pool: SqlitePool,
    cache_key: String,
}

impl SqliteEmbeddingCache {
    /// Open the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path, cache_key: impl Into<String>) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open embedding cache: {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, cache_key))
    }

    pub fn with_pool(pool: SqlitePool, cache_key: impl Into<String>) -> Self {
        Self {
            pool,
            cache_key: cache_key.into(),
        }
    }

    /// Number of entries stored under this cache key.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM embedding_cache WHERE cache_key = ?")
                .bind(&self.cache_key)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl EmbeddingCache for SqliteEmbeddingCache {
    fn cache_key(&self) -> &str {
        &self.cache_key
    }

    async fn get_embedding(&self, chunk_id: &str) -> Result<Option<EmbeddingRecord>> {
        let row = sqlx::query(
            "SELECT content, vector FROM embedding_cache WHERE cache_key = ? AND chunk_id = ?",
        )
        .bind(&self.cache_key)
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let blob: Vec<u8> = row.get("vector");
            EmbeddingRecord {
                content: row.get("content"),
                vector: blob_to_vec(&blob),
            }
        }))
    }

    async fn get_many(&self, chunk_ids: &[String]) -> Result<HashMap<String, EmbeddingRecord>> {
        let mut found = HashMap::with_capacity(chunk_ids.len());

        for ids in chunk_ids.chunks(LOOKUP_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT chunk_id, content, vector FROM embedding_cache WHERE cache_key = ",
            );
            qb.push_bind(&self.cache_key);
            qb.push(" AND chunk_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in rows {
                let blob: Vec<u8> = row.get("vector");
                found.insert(
                    row.get("chunk_id"),
                    EmbeddingRecord {
                        content: row.get("content"),
                        vector: blob_to_vec(&blob),
                    },
                );
            }
        }

        Ok(found)
    }

    async fn cached_ids(&self, chunk_ids: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::with_capacity(chunk_ids.len());

        for ids in chunk_ids.chunks(LOOKUP_BATCH) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT chunk_id FROM embedding_cache WHERE cache_key = ");
            qb.push_bind(&self.cache_key);
            qb.push(" AND chunk_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            found.extend(rows.into_iter().map(|row| row.get::<String, _>("chunk_id")));
        }

        Ok(found)
    }

    async fn put_batch(&self, entries: Vec<(String, EmbeddingRecord)>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (chunk_id, record) in &entries {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO embedding_cache
                    (cache_key, chunk_id, content, dims, vector, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.cache_key)
            .bind(chunk_id)
            .bind(&record.content)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT chunk_id FROM embedding_cache WHERE cache_key = ? ORDER BY chunk_id",
        )
        .bind(&self.cache_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            content: content.to_string(),
            vector: vec![0.25, -1.0, 3.5],
        }
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = SqliteEmbeddingCache::open(&tmp.path().join("cache.sqlite"), "m1")
            .await
            .unwrap();

        cache
            .put_batch(vec![("a".to_string(), record("alpha"))])
            .await
            .unwrap();

        let got = cache.get_embedding("a").await.unwrap().unwrap();
        assert_eq!(got, record("alpha"));
        assert!(cache.get_embedding("b").await.unwrap().is_none());
        assert_eq!(cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cache_keys_are_isolated() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.sqlite");
        let first = SqliteEmbeddingCache::open(&path, "model-a").await.unwrap();
        first
            .put_batch(vec![("x".to_string(), record("shared text"))])
            .await
            .unwrap();

        let second = SqliteEmbeddingCache::open(&path, "model-b").await.unwrap();
        assert!(second.get_embedding("x").await.unwrap().is_none());
        assert!(second.keys().await.unwrap().is_empty());
        assert_eq!(first.keys().await.unwrap(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_insert_or_ignore_keeps_first() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = SqliteEmbeddingCache::open(&tmp.path().join("c.sqlite"), "k")
            .await
            .unwrap();
        cache
            .put_batch(vec![("a".to_string(), record("first"))])
            .await
            .unwrap();
        cache
            .put_batch(vec![("a".to_string(), record("second"))])
            .await
            .unwrap();
        let got = cache.get_embedding("a").await.unwrap().unwrap();
        assert_eq!(got.content, "first");
    }

    #[tokio::test]
    async fn test_get_many_spans_lookup_batches() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cache = SqliteEmbeddingCache::open(&tmp.path().join("c.sqlite"), "k")
            .await
            .unwrap();
        let entries: Vec<(String, EmbeddingRecord)> = (0..1200)
            .map(|i| (format!("id{i}"), record(&format!("text {i}"))))
            .collect();
        cache.put_batch(entries).await.unwrap();

        let mut ids: Vec<String> = (0..1200).map(|i| format!("id{i}")).collect();
        ids.push("missing".to_string());
        let got = cache.get_many(&ids).await.unwrap();
        assert_eq!(got.len(), 1200);
        assert_eq!(got["id1199"].content, "text 1199");
        assert_eq!(cache.cached_ids(&ids).await.unwrap().len(), 1200);
    }
}
