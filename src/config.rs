//! TOML configuration.
//!
//! Every section and field is optional; a missing file section falls back
//! to the defaults below. [`load_config`] validates the result and fails
//! with a message naming the offending key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use recall_harness_core::cache::MAX_BATCH_SIZE;
use recall_harness_core::chunk::{
    ChunkingParams, SeparatorPreset, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
use recall_harness_core::page::DEFAULT_PAGE_SIZE;
use recall_harness_core::rerank::{
    RerankOptions, VerdictOrdering, DEFAULT_CONCURRENCY, DEFAULT_CUTOFF,
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub separators: SeparatorPreset,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: SeparatorPreset::default(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams::new(self.chunk_size, self.chunk_overlap).with_preset(self.separators)
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Scope for stored vectors. Defaults to `"<provider>:<model>"`.
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            key: None,
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/embeddings.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_cutoff")]
    pub cutoff: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            page_size: DEFAULT_PAGE_SIZE,
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_cutoff() -> usize {
    DEFAULT_CUTOFF
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_deadline_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub ordering: VerdictOrdering,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base URL for the Ollama judge.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_rerank_model(),
            timeout_secs: default_rerank_timeout_secs(),
            concurrency: DEFAULT_CONCURRENCY,
            ordering: VerdictOrdering::default(),
            max_retries: default_max_retries(),
            url: None,
        }
    }
}

impl RerankConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_rerank_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_rerank_timeout_secs() -> u64 {
    20
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Config {
    /// The cache scope in effect: the explicit key, or provider and model.
    pub fn cache_key(&self) -> String {
        match &self.cache.key {
            Some(key) => key.clone(),
            None => format!(
                "{}:{}",
                self.embedding.provider,
                self.embedding.model.as_deref().unwrap_or("default")
            ),
        }
    }

    pub fn rerank_options(&self) -> RerankOptions {
        RerankOptions {
            cutoff: self.retrieval.cutoff,
            concurrency: self.rerank.concurrency,
            ordering: self.rerank.ordering,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    // Validate embedding
    if !(1..=MAX_BATCH_SIZE).contains(&config.embedding.batch_size) {
        bail!("embedding.batch_size must be between 1 and {}", MAX_BATCH_SIZE);
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.page_size == 0 {
        bail!("retrieval.page_size must be >= 1");
    }
    if config.retrieval.deadline_secs == 0 {
        bail!("retrieval.deadline_secs must be >= 1");
    }

    // Validate rerank
    match config.rerank.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown rerank provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.rerank.concurrency == 0 {
        bail!("rerank.concurrency must be >= 1");
    }
    if config.rerank.timeout_secs == 0 {
        bail!("rerank.timeout_secs must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.embedding.batch_size, 99);
        assert_eq!(config.retrieval.cutoff, 30);
        assert_eq!(config.retrieval.page_size, 20);
        assert!(!config.embedding.is_enabled());
        assert!(!config.rerank.is_enabled());
        assert_eq!(config.cache_key(), "disabled:default");
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
            [chunking]
            chunk_size = 500
            chunk_overlap = 50
            separators = "markdown"

            [cache]
            path = "/tmp/cache.sqlite"
            key = "book-v1"

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768
            batch_size = 32

            [retrieval]
            cutoff = 10

            [rerank]
            provider = "openai"
            ordering = "rejected-last"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.separators, SeparatorPreset::Markdown);
        assert_eq!(config.cache_key(), "book-v1");
        assert_eq!(config.embedding.batch_size, 32);
        let opts = config.rerank_options();
        assert_eq!(opts.cutoff, 10);
        assert_eq!(opts.ordering, VerdictOrdering::RejectedLast);
    }

    #[test]
    fn test_default_cache_key_names_model() {
        let config = parse_config(
            r#"
            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            dims = 1536
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_key(), "openai:text-embedding-3-small");
    }

    #[test]
    fn test_rejects_oversized_batch() {
        let err = parse_config("[embedding]\nbatch_size = 100\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").is_err());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse_config("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[rerank]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[rerank]\nordering = \"random\"\n").is_err());
    }
}
