//! Cosine-similarity scoring against cached chunk embeddings.

use crate::cache::EmbeddingCache;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{RetrievalError, Stage};
use crate::models::{rank_descending, Chunk, RankedResult};

/// Score every chunk by cosine similarity between its cached vector and
/// the embedded query.
///
/// The cache must hold an entry for every chunk; a gap is reported as
/// [`RetrievalError::CacheMiss`] before the provider is called. Cache
/// entries for chunks outside `chunks` are ignored. Results are sorted
/// descending with ties in chunk order.
pub async fn score_by_embedding(
    chunks: &[Chunk],
    query: &str,
    cache: &dyn EmbeddingCache,
    provider: &dyn EmbeddingProvider,
) -> Result<Vec<RankedResult>, RetrievalError> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let records = cache
        .get_many(&ids)
        .await
        .map_err(|e| RetrievalError::collaborator(Stage::CacheLookup, e))?;

    let missing: Vec<&String> = ids.iter().filter(|id| !records.contains_key(*id)).collect();
    if let Some(first) = missing.first() {
        return Err(RetrievalError::CacheMiss {
            cache_key: cache.cache_key().to_string(),
            chunk_id: (*first).clone(),
            missing: missing.len(),
            total: ids.len(),
        });
    }

    let query_vec = provider
        .embed_one(query)
        .await
        .map_err(|e| RetrievalError::collaborator(Stage::QueryEmbedding, e))?;

    let mut scored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let Some(record) = records.get(&chunk.id) else {
            continue;
        };
        if record.vector.len() != query_vec.len() {
            return Err(RetrievalError::DimensionMismatch {
                chunk_id: chunk.id.clone(),
                expected: query_vec.len(),
                actual: record.vector.len(),
            });
        }
        scored.push(RankedResult {
            key: chunk.id.clone(),
            score: f64::from(cosine_similarity(&query_vec, &record.vector)),
        });
    }

    Ok(rank_descending(scored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryEmbeddingCache;
    use crate::cache::{fill_missing, EmbeddingCache};
    use crate::models::EmbeddingRecord;
    use crate::test_utils::{chunk, FakeProvider};

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("The cat sat on the mat."),
            chunk("Dogs bark at cats."),
            chunk("The weather is sunny today."),
        ]
    }

    #[tokio::test]
    async fn test_scores_every_chunk_sorted() {
        let chunks = corpus();
        let cache = InMemoryEmbeddingCache::new("test");
        let provider = FakeProvider::new();
        fill_missing(&chunks, &cache, &provider, 99).await.unwrap();

        let results = score_by_embedding(&chunks, "sunny weather", &cache, &provider)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].key, chunks[2].id);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
    }

    #[tokio::test]
    async fn test_missing_entry_fails_before_provider_call() {
        let chunks = corpus();
        let cache = InMemoryEmbeddingCache::new("book");
        let provider = FakeProvider::new();
        fill_missing(&chunks[..2], &cache, &provider, 99).await.unwrap();
        let calls = provider.calls();

        let err = score_by_embedding(&chunks, "cat", &cache, &provider)
            .await
            .unwrap_err();
        match err {
            RetrievalError::CacheMiss {
                cache_key,
                chunk_id,
                missing,
                total,
            } => {
                assert_eq!(cache_key, "book");
                assert_eq!(chunk_id, chunks[2].id);
                assert_eq!(missing, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected CacheMiss, got {other:?}"),
        }
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn test_orphans_ignored() {
        let chunks = corpus();
        let cache = InMemoryEmbeddingCache::new("test");
        let provider = FakeProvider::new();
        fill_missing(&chunks, &cache, &provider, 99).await.unwrap();
        cache
            .put_batch(vec![(
                "orphan".to_string(),
                EmbeddingRecord {
                    content: "cat cat cat".to_string(),
                    vector: FakeProvider::vector_for("cat cat cat"),
                },
            )])
            .await
            .unwrap();

        let results = score_by_embedding(&chunks, "cat", &cache, &provider)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.key != "orphan"));
    }

    #[tokio::test]
    async fn test_empty_chunk_set() {
        let cache = InMemoryEmbeddingCache::new("test");
        let provider = FakeProvider::new();
        let results = score_by_embedding(&[], "cat", &cache, &provider)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let chunks = vec![chunk("short vector")];
        let cache = InMemoryEmbeddingCache::new("test");
        cache
            .put_batch(vec![(
                chunks[0].id.clone(),
                EmbeddingRecord {
                    content: chunks[0].content.clone(),
                    vector: vec![1.0, 0.0],
                },
            )])
            .await
            .unwrap();
        let provider = FakeProvider::new();
        let err = score_by_embedding(&chunks, "cat", &cache, &provider)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { actual: 2, .. }
        ));
    }
}
