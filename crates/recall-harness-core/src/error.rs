//! Error taxonomy for the retrieval pipeline.
//!
//! Pure-computation failures (bad input, incomplete cache) are fatal and
//! carry the chunk id and stage needed to diagnose them. Failures of the
//! external collaborators are wrapped in [`RetrievalError::Collaborator`]
//! at their call site. Per-candidate judgment failures are represented by
//! [`RetrievalError::Judgment`] but are recovered locally by the reranker
//! and never returned from it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Chunking,
    KeywordScoring,
    SemanticScoring,
    QueryEmbedding,
    CacheLookup,
    CacheWrite,
    CacheFill,
    Scoring,
    Reranking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chunking => "chunking",
            Self::KeywordScoring => "keyword scoring",
            Self::SemanticScoring => "semantic scoring",
            Self::QueryEmbedding => "query embedding",
            Self::CacheLookup => "cache lookup",
            Self::CacheWrite => "cache write",
            Self::CacheFill => "cache fill",
            Self::Scoring => "scoring",
            Self::Reranking => "reranking",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed or empty corpus, or invalid chunking parameters.
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// The semantic scorer found chunks with no cache entry.
    #[error(
        "embedding cache '{cache_key}' is missing {missing} of {total} chunks \
         (first missing: {chunk_id}); fill the cache before querying"
    )]
    CacheMiss {
        cache_key: String,
        chunk_id: String,
        missing: usize,
        total: usize,
    },

    /// One or more provider batches failed during cache fill.
    #[error("{failed_batches} embedding batch(es) failed; {outstanding} chunks remain unembedded")]
    ProviderBatch {
        failed_batches: usize,
        outstanding: usize,
    },

    /// A single judgment call failed or timed out.
    #[error("judgment failed for chunk {chunk_id}: {reason}")]
    Judgment { chunk_id: String, reason: String },

    /// A cached vector does not match the query vector's dimensionality.
    #[error("vector dimension mismatch for chunk {chunk_id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },

    /// A stage exceeded its caller-imposed deadline.
    #[error("{stage} exceeded its deadline of {after:?}")]
    Timeout { stage: Stage, after: Duration },

    /// An external collaborator (provider, cache backend, task runtime) failed.
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl RetrievalError {
    /// Wrap a collaborator error with the stage it occurred in.
    pub fn collaborator(stage: Stage, err: anyhow::Error) -> Self {
        Self::Collaborator {
            stage,
            source: err.into(),
        }
    }

    /// The stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Chunking(_) => Stage::Chunking,
            Self::CacheMiss { .. } | Self::DimensionMismatch { .. } => Stage::SemanticScoring,
            Self::ProviderBatch { .. } => Stage::CacheFill,
            Self::Judgment { .. } => Stage::Reranking,
            Self::Timeout { stage, .. } | Self::Collaborator { stage, .. } => *stage,
        }
    }
}
