//! `recall embed` and `recall status`.

use anyhow::{bail, Result};
use std::path::Path;

use recall_harness_core::cache::{coverage, EmbeddingCache, MAX_BATCH_SIZE};
use recall_harness_core::chunk::ChunkStore;

use crate::config::Config;
use crate::search::{build_retriever, read_corpus};
use crate::sqlite_cache::SqliteEmbeddingCache;

/// Embed every chunk of the corpus that the cache lacks.
///
/// Exits with an error if any batch failed, after printing the report;
/// re-running picks up only the chunks still missing.
pub async fn run_embed(
    config: &Config,
    corpus_path: &Path,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let corpus = read_corpus(corpus_path)?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    if dry_run {
        let cache = SqliteEmbeddingCache::open(&config.cache.path, config.cache_key()).await?;
        let store = ChunkStore::new(config.chunking.params())?;
        let chunks = store.chunks(&corpus)?;
        let cov = coverage(chunks.as_slice(), &cache).await?;
        println!("embed (dry-run)");
        println!("  cache key: {}", cov.cache_key);
        println!("  chunks: {}", cov.chunks);
        println!("  chunks needing embeddings: {}", cov.missing);
        println!(
            "  batches: {}",
            cov.missing.div_ceil(batch_size.clamp(1, MAX_BATCH_SIZE))
        );
        cache.close().await;
        return Ok(());
    }

    let retriever = build_retriever(config).await?;
    let report = retriever.fill_cache(&corpus, batch_size).await?;

    println!("embed");
    println!("  cache key: {}", config.cache_key());
    println!("  total chunks: {}", report.total);
    println!("  already cached: {}", report.already_cached);
    println!("  embedded: {}", report.embedded);
    println!("  failed: {}", report.failed);
    println!("  batches: {} ({} failed)", report.batches, report.failed_batches);

    report.into_result()?;
    Ok(())
}

/// Print how much of the corpus the cache covers.
pub async fn run_status(config: &Config, corpus_path: &Path) -> Result<()> {
    let corpus = read_corpus(corpus_path)?;
    let store = ChunkStore::new(config.chunking.params())?;
    let chunks = store.chunks(&corpus)?;
    let cache = SqliteEmbeddingCache::open(&config.cache.path, config.cache_key()).await?;
    let cov = coverage(chunks.as_slice(), &cache).await?;
    let stored = cache.count().await?;

    println!("Recall Harness: Cache Status");
    println!("=============================");
    println!();
    println!("  Cache:       {}", config.cache.path.display());
    println!("  Cache key:   {}", cov.cache_key);
    println!("  Entries:     {}", stored);
    println!();
    println!("  Chunks:      {}", cov.chunks);
    println!(
        "  Cached:      {} / {} ({}%)",
        cov.cached,
        cov.chunks,
        if cov.chunks > 0 {
            cov.cached * 100 / cov.chunks
        } else {
            0
        }
    );
    println!("  Missing:     {}", cov.missing);
    println!("  Orphaned:    {}", cov.orphaned);

    cache.close().await;
    Ok(())
}
