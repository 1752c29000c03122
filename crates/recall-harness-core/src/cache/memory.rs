//! In-memory [`EmbeddingCache`] for tests and one-shot runs.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use super::EmbeddingCache;
use crate::models::EmbeddingRecord;

pub struct InMemoryEmbeddingCache {
    cache_key: String,
    entries: RwLock<HashMap<String, EmbeddingRecord>>,
}

impl InMemoryEmbeddingCache {
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EmbeddingCache for InMemoryEmbeddingCache {
    fn cache_key(&self) -> &str {
        &self.cache_key
    }

    async fn get_embedding(&self, chunk_id: &str) -> Result<Option<EmbeddingRecord>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(chunk_id).cloned())
    }

    async fn get_many(&self, chunk_ids: &[String]) -> Result<HashMap<String, EmbeddingRecord>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(chunk_ids
            .iter()
            .filter_map(|id| entries.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    async fn cached_ids(&self, chunk_ids: &[String]) -> Result<HashSet<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(chunk_ids
            .iter()
            .filter(|id| entries.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn put_batch(&self, batch: Vec<(String, EmbeddingRecord)>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (id, record) in batch {
            entries.entry(id).or_insert(record);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str, x: f32) -> EmbeddingRecord {
        EmbeddingRecord {
            content: content.to_string(),
            vector: vec![x, 1.0],
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = InMemoryEmbeddingCache::new("k");
        assert!(cache.is_empty());
        cache
            .put_batch(vec![("a".into(), record("alpha", 1.0))])
            .await
            .unwrap();
        let got = cache.get_embedding("a").await.unwrap().unwrap();
        assert_eq!(got.content, "alpha");
        assert!(cache.get_embedding("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_entries_not_overwritten() {
        let cache = InMemoryEmbeddingCache::new("k");
        cache
            .put_batch(vec![("a".into(), record("first", 1.0))])
            .await
            .unwrap();
        cache
            .put_batch(vec![("a".into(), record("second", 2.0))])
            .await
            .unwrap();
        let got = cache.get_embedding("a").await.unwrap().unwrap();
        assert_eq!(got.content, "first");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_many_skips_absent() {
        let cache = InMemoryEmbeddingCache::new("k");
        cache
            .put_batch(vec![
                ("a".into(), record("alpha", 1.0)),
                ("b".into(), record("beta", 2.0)),
            ])
            .await
            .unwrap();
        let ids = vec!["a".to_string(), "zzz".to_string()];
        let got = cache.get_many(&ids).await.unwrap();
        assert_eq!(got.len(), 1);
        assert!(got.contains_key("a"));
        let present = cache.cached_ids(&ids).await.unwrap();
        assert_eq!(present.len(), 1);
        assert_eq!(cache.keys().await.unwrap(), vec!["a", "b"]);
    }
}
