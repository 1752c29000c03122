//! The retrieval entry point.
//!
//! [`Retriever::retrieve`] runs one query against a corpus:
//!
//! 1. Chunk the corpus (memoized per corpus text).
//! 2. Score by keywords (BM25, on the blocking pool) and by embedding
//!    (cosine, async) concurrently, under one deadline.
//! 3. Fuse both rankings with reciprocal rank fusion.
//! 4. Rerank the top candidates if a judge is configured.
//!
//! With neither keywords nor a semantic query, every chunk is returned in
//! corpus order with zero scores and verdict `not-passed`.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use recall_harness_core::bm25::score_by_keywords;
use recall_harness_core::cache::memory::InMemoryEmbeddingCache;
use recall_harness_core::cache::{self, CacheCoverage, EmbeddingCache, FillReport};
use recall_harness_core::chunk::{ChunkSet, ChunkStore, ChunkingParams};
use recall_harness_core::embedding::EmbeddingProvider;
use recall_harness_core::fusion::{fuse, Ranking};
use recall_harness_core::models::{FusedResult, RankedResult, RerankedResult};
use recall_harness_core::page::{paginate, SearchPage, DEFAULT_PAGE_SIZE};
use recall_harness_core::rerank::{
    pass_through, rerank, JudgmentCollaborator, RerankOptions, VerdictOrdering,
    DEFAULT_CONCURRENCY, DEFAULT_CUTOFF,
};
use recall_harness_core::semantic::score_by_embedding;
use recall_harness_core::{RetrievalError, Stage};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::judge::create_judge;
use crate::sqlite_cache::SqliteEmbeddingCache;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Per-query options for [`Retriever::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Reranking depth.
    pub cutoff: usize,
    pub page_size: usize,
    pub ordering: VerdictOrdering,
    /// Budget for the scoring stage; exceeding it fails the query.
    pub deadline: Duration,
    pub judge_concurrency: usize,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            page_size: DEFAULT_PAGE_SIZE,
            ordering: VerdictOrdering::default(),
            deadline: DEFAULT_DEADLINE,
            judge_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl RetrieveOptions {
    pub fn from_config(config: &Config) -> Self {
        let rerank = config.rerank_options();
        Self {
            cutoff: rerank.cutoff,
            page_size: config.retrieval.page_size,
            ordering: rerank.ordering,
            deadline: config.retrieval.deadline(),
            judge_concurrency: rerank.concurrency,
        }
    }

    fn rerank_options(&self) -> RerankOptions {
        RerankOptions {
            cutoff: self.cutoff,
            concurrency: self.judge_concurrency,
            ordering: self.ordering,
        }
    }
}

/// Chunk store, embedding cache, and collaborators for one corpus.
pub struct Retriever {
    chunk_store: ChunkStore,
    cache: Arc<dyn EmbeddingCache>,
    provider: Arc<dyn EmbeddingProvider>,
    judge: Option<Arc<dyn JudgmentCollaborator>>,
}

impl Retriever {
    pub fn new(
        params: ChunkingParams,
        cache: Arc<dyn EmbeddingCache>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RetrievalError> {
        Ok(Self {
            chunk_store: ChunkStore::new(params)?,
            cache,
            provider,
            judge: None,
        })
    }

    pub fn with_judge(mut self, judge: Arc<dyn JudgmentCollaborator>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn chunks(&self, corpus: &str) -> Result<Arc<ChunkSet>, RetrievalError> {
        self.chunk_store.chunks(corpus)
    }

    /// Embed every chunk of `corpus` the cache does not yet hold.
    pub async fn fill_cache(
        &self,
        corpus: &str,
        batch_size: usize,
    ) -> Result<FillReport, RetrievalError> {
        let chunks = self.chunks(corpus)?;
        info!(chunks = chunks.len(), "chunked corpus");
        cache::fill_missing(
            chunks.as_slice(),
            self.cache.as_ref(),
            self.provider.as_ref(),
            batch_size,
        )
        .await
    }

    pub async fn coverage(&self, corpus: &str) -> Result<CacheCoverage, RetrievalError> {
        let chunks = self.chunks(corpus)?;
        cache::coverage(chunks.as_slice(), self.cache.as_ref()).await
    }

    /// Run one query and return every candidate, best first.
    pub async fn retrieve<S: AsRef<str>>(
        &self,
        corpus: &str,
        keywords: &[S],
        semantic_query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<RerankedResult>, RetrievalError> {
        let started = Instant::now();
        let chunks = self.chunks(corpus)?;

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let query = semantic_query.trim();

        if keywords.is_empty() && query.is_empty() {
            debug!(chunks = chunks.len(), "no query; returning corpus order");
            let all = chunks
                .iter()
                .map(|c| FusedResult::unscored(c.id.clone()))
                .collect();
            return Ok(pass_through(all, &chunks));
        }

        let (semantic, keyword) = self
            .score(Arc::clone(&chunks), &keywords, query, options.deadline)
            .await?;
        let scored_at = started.elapsed();

        let fused = fuse(&[Ranking::semantic(&semantic), Ranking::keyword(&keyword)]);

        let results = match &self.judge {
            Some(judge) => {
                let judge_query = if query.is_empty() {
                    keywords.join(" ")
                } else {
                    query.to_string()
                };
                rerank(
                    fused,
                    &chunks,
                    &judge_query,
                    judge.as_ref(),
                    &options.rerank_options(),
                )
                .await
            }
            None => pass_through(fused, &chunks),
        };

        info!(
            chunks = chunks.len(),
            keyword_hits = keyword.len(),
            semantic_hits = semantic.len(),
            results = results.len(),
            scoring_ms = scored_at.as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(results)
    }

    /// [`retrieve`](Self::retrieve), then slice out one page.
    pub async fn retrieve_page<S: AsRef<str>>(
        &self,
        corpus: &str,
        keywords: &[S],
        semantic_query: &str,
        page: usize,
        options: &RetrieveOptions,
    ) -> Result<SearchPage, RetrievalError> {
        let results = self
            .retrieve(corpus, keywords, semantic_query, options)
            .await?;
        Ok(paginate(&results, page, options.page_size))
    }

    /// Run both scorers concurrently. Either failing, or the pair
    /// overrunning `deadline`, fails the whole query.
    async fn score(
        &self,
        chunks: Arc<ChunkSet>,
        keywords: &[String],
        query: &str,
        deadline: Duration,
    ) -> Result<(Vec<RankedResult>, Vec<RankedResult>), RetrievalError> {
        let keyword_task = {
            let chunks = Arc::clone(&chunks);
            let keywords = keywords.to_vec();
            async move {
                if keywords.is_empty() {
                    return Ok(Vec::new());
                }
                tokio::task::spawn_blocking(move || score_by_keywords(chunks.as_slice(), &keywords))
                    .await
                    .map_err(|e| RetrievalError::collaborator(Stage::KeywordScoring, e.into()))
            }
        };

        let semantic_task = async {
            if query.is_empty() {
                return Ok(Vec::new());
            }
            score_by_embedding(
                chunks.as_slice(),
                query,
                self.cache.as_ref(),
                self.provider.as_ref(),
            )
            .await
        };

        match tokio::time::timeout(deadline, async {
            tokio::try_join!(semantic_task, keyword_task)
        })
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout {
                stage: Stage::Scoring,
                after: deadline,
            }),
        }
    }
}

/// Build a retriever from configuration.
///
/// With embeddings disabled the cache is in-memory and never touched, so
/// keyword-only queries do not create the cache database.
pub async fn build_retriever(config: &Config) -> Result<Retriever> {
    let provider = create_provider(&config.embedding)?;
    let cache: Arc<dyn EmbeddingCache> = if config.embedding.is_enabled() {
        Arc::new(SqliteEmbeddingCache::open(&config.cache.path, config.cache_key()).await?)
    } else {
        Arc::new(InMemoryEmbeddingCache::new(config.cache_key()))
    };

    let mut retriever = Retriever::new(config.chunking.params(), cache, provider)?;
    if let Some(judge) = create_judge(&config.rerank)? {
        retriever = retriever.with_judge(judge);
    }
    Ok(retriever)
}

pub fn read_corpus(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus: {}", path.display()))
}

/// CLI arguments for `recall search`.
pub struct SearchArgs {
    pub keywords: Vec<String>,
    pub query: Option<String>,
    pub cutoff: Option<usize>,
    pub page: usize,
    pub page_size: Option<usize>,
    pub json: bool,
}

pub async fn run_search(config: &Config, corpus_path: &Path, args: SearchArgs) -> Result<()> {
    let query = args.query.unwrap_or_default();
    if !query.trim().is_empty() && !config.embedding.is_enabled() {
        bail!("--query requires an embedding provider. Set [embedding] provider in config.");
    }

    let corpus = read_corpus(corpus_path)?;
    let retriever = build_retriever(config).await?;

    let mut options = RetrieveOptions::from_config(config);
    if let Some(cutoff) = args.cutoff {
        options.cutoff = cutoff;
    }
    if let Some(page_size) = args.page_size {
        options.page_size = page_size;
    }

    let page = retriever
        .retrieve_page(&corpus, &args.keywords, &query, args.page, &options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for item in &page.results {
        let r = &item.result;
        println!(
            "{}. [{}] fused={:.5} bm25={:.3} embedding={:.3}",
            item.index + 1, r.verdict, r.result.fused_score, r.result.bm25_score, r.result.embedding_score
        );
        println!("    {}", preview(&r.content, 160));
        println!("    id: {}", r.result.key);
        println!();
    }

    let stats = &page.stats;
    println!(
        "page {}/{} · {} results · avg {} chars · fused {:.5}..{:.5}",
        stats.current_page,
        stats.page_count,
        stats.total,
        stats.avg_chars,
        stats.min_score,
        stats.max_score
    );
    Ok(())
}

/// First `max` characters of `text` on one line.
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}
