//! # Recall Harness Core
//!
//! Runtime-agnostic retrieval logic for Recall Harness: the chunk model,
//! BM25 keyword scoring, the embedding cache abstraction, semantic scoring,
//! reciprocal rank fusion, and verdict-based reranking.
//!
//! This crate contains no tokio, sqlx, or network I/O. Embedding providers,
//! judgment collaborators, and durable caches are supplied by the caller
//! through the traits in [`embedding`], [`rerank`], and [`cache`].
//!
//! ## Pipeline
//!
//! ```text
//!                 ┌──────────────┐
//!  corpus text ──▶│  ChunkStore  │
//!                 └──────┬───────┘
//!            ┌───────────┴────────────┐
//!            ▼                        ▼
//!     ┌────────────┐          ┌──────────────┐
//!     │    BM25    │          │   Semantic   │◀── EmbeddingCache
//!     └─────┬──────┘          └──────┬───────┘
//!           └───────────┬────────────┘
//!                       ▼
//!                ┌────────────┐     ┌──────────┐
//!                │ RRF fusion │────▶│ Reranker │──▶ results
//!                └────────────┘     └──────────┘
//! ```

pub mod bm25;
pub mod cache;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod models;
pub mod page;
pub mod rerank;
pub mod semantic;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{RetrievalError, Stage};
