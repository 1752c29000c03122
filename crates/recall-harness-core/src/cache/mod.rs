//! Embedding cache abstraction and incremental fill.
//!
//! An [`EmbeddingCache`] is a durable map from chunk id to
//! [`EmbeddingRecord`], scoped by a cache key (typically the provider and
//! model that produced the vectors). Entries are written once and never
//! updated: the id is a content hash, so a stored vector is always valid
//! for its chunk.
//!
//! [`fill_missing`] embeds only the chunks the cache lacks, in sequential
//! batches. A failed batch is counted and skipped so later batches still
//! run; calling it again resumes where the previous call stopped.

pub mod memory;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{RetrievalError, Stage};
use crate::models::{Chunk, EmbeddingRecord};

/// Upper bound on chunks per provider request.
pub const MAX_BATCH_SIZE: usize = 99;

/// Durable chunk-id → embedding map.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_embedding`](EmbeddingCache::get_embedding) | Look up one chunk |
/// | [`get_many`](EmbeddingCache::get_many) | Look up many chunks at once |
/// | [`cached_ids`](EmbeddingCache::cached_ids) | Which of the given ids are present |
/// | [`put_batch`](EmbeddingCache::put_batch) | Persist a batch atomically |
/// | [`keys`](EmbeddingCache::keys) | Every id stored under this cache key |
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    /// The scope this cache instance reads and writes.
    fn cache_key(&self) -> &str;

    async fn get_embedding(&self, chunk_id: &str) -> Result<Option<EmbeddingRecord>>;

    /// Records for the ids that are present. Absent ids are simply missing
    /// from the returned map.
    async fn get_many(&self, chunk_ids: &[String]) -> Result<HashMap<String, EmbeddingRecord>>;

    async fn cached_ids(&self, chunk_ids: &[String]) -> Result<HashSet<String>> {
        Ok(self.get_many(chunk_ids).await?.into_keys().collect())
    }

    /// Persist a batch. Either every entry becomes visible or none does.
    /// Ids already present are left untouched.
    async fn put_batch(&self, entries: Vec<(String, EmbeddingRecord)>) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

/// Outcome of one [`fill_missing`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Chunks in the current set.
    pub total: usize,
    /// Chunks that were already cached before this call.
    pub already_cached: usize,
    /// Chunks embedded and persisted by this call.
    pub embedded: usize,
    /// Chunks whose batch failed.
    pub failed: usize,
    /// Provider requests attempted.
    pub batches: usize,
    pub failed_batches: usize,
}

impl FillReport {
    /// Chunks still lacking a cache entry.
    pub fn outstanding(&self) -> usize {
        self.total - self.already_cached - self.embedded
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding() == 0
    }

    /// Turn a partial fill into [`RetrievalError::ProviderBatch`].
    pub fn into_result(self) -> Result<Self, RetrievalError> {
        if self.failed_batches > 0 {
            return Err(RetrievalError::ProviderBatch {
                failed_batches: self.failed_batches,
                outstanding: self.outstanding(),
            });
        }
        Ok(self)
    }
}

/// Embed every chunk the cache lacks, `batch_size` chunks per request.
///
/// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`. Batches run one after
/// another. A batch fails when the provider errors, returns the wrong
/// number of vectors, or returns vectors whose length disagrees with
/// [`EmbeddingProvider::dims`]; the failure is logged and counted and the
/// fill moves on. Cache read or write errors abort the fill.
pub async fn fill_missing(
    chunks: &[Chunk],
    cache: &dyn EmbeddingCache,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<FillReport, RetrievalError> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let cached = cache
        .cached_ids(&ids)
        .await
        .map_err(|e| RetrievalError::collaborator(Stage::CacheLookup, e))?;

    let mut seen = HashSet::new();
    let missing: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| !cached.contains(&c.id) && seen.insert(c.id.as_str()))
        .collect();

    let mut report = FillReport {
        total: cached.len() + missing.len(),
        already_cached: cached.len(),
        ..FillReport::default()
    };

    info!(
        cache_key = cache.cache_key(),
        total = report.total,
        cached = report.already_cached,
        missing = missing.len(),
        "Total chunks {}, already cached {}, to embed {}",
        report.total,
        report.already_cached,
        missing.len()
    );

    let batch_count = missing.len().div_ceil(batch_size);
    for (i, batch) in missing.chunks(batch_size).enumerate() {
        report.batches += 1;
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

        let vectors = match embed_batch(provider, &texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    batch = i + 1,
                    of = batch_count,
                    size = batch.len(),
                    error = %e,
                    "embedding batch failed; continuing"
                );
                report.failed += batch.len();
                report.failed_batches += 1;
                continue;
            }
        };

        let entries: Vec<(String, EmbeddingRecord)> = batch
            .iter()
            .zip(vectors)
            .map(|(c, vector)| {
                (
                    c.id.clone(),
                    EmbeddingRecord {
                        content: c.content.clone(),
                        vector,
                    },
                )
            })
            .collect();

        cache
            .put_batch(entries)
            .await
            .map_err(|e| RetrievalError::collaborator(Stage::CacheWrite, e))?;
        report.embedded += batch.len();

        info!(
            batch = i + 1,
            of = batch_count,
            embedded = report.embedded,
            remaining = missing.len() - report.embedded - report.failed,
            "embedded batch"
        );
    }

    Ok(report)
}

async fn embed_batch(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = provider.embed_many(texts).await?;
    if vectors.len() != texts.len() {
        anyhow::bail!(
            "provider returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        );
    }
    let expected = provider.dims();
    if expected > 0 {
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            anyhow::bail!(
                "provider returned a {}-dim vector, expected {}",
                bad.len(),
                expected
            );
        }
    }
    Ok(vectors)
}

/// How a cache relates to the current chunk set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheCoverage {
    pub cache_key: String,
    pub chunks: usize,
    pub cached: usize,
    pub missing: usize,
    /// Entries with no corresponding chunk in the current set.
    pub orphaned: usize,
}

pub async fn coverage(
    chunks: &[Chunk],
    cache: &dyn EmbeddingCache,
) -> Result<CacheCoverage, RetrievalError> {
    let stored: HashSet<String> = cache
        .keys()
        .await
        .map_err(|e| RetrievalError::collaborator(Stage::CacheLookup, e))?
        .into_iter()
        .collect();
    let current: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let cached = current.iter().filter(|id| stored.contains(**id)).count();
    let orphaned = stored
        .iter()
        .filter(|id| !current.contains(id.as_str()))
        .count();

    Ok(CacheCoverage {
        cache_key: cache.cache_key().to_string(),
        chunks: current.len(),
        cached,
        missing: current.len() - cached,
        orphaned,
    })
}
