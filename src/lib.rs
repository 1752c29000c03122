//! # Recall Harness
//!
//! Hybrid retrieval over a single text corpus: BM25 keyword scoring and
//! cached-embedding semantic scoring run side by side, their rankings are
//! merged with reciprocal rank fusion, and an optional LLM judge sorts the
//! top candidates into approved, rejected, and not-passed.
//!
//! The pure pipeline lives in [`recall_harness_core`]. This crate supplies
//! the pieces that touch the outside world:
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ corpus file  │──▶│    Retriever    │──▶│ CLI (recall) │
//! └──────────────┘   └───┬─────────┬───┘   └──────────────┘
//!                        │         │
//!              ┌─────────▼──┐   ┌──▼──────────────┐
//!              │   SQLite   │   │ OpenAI / Ollama │
//!              │ emb. cache │   │ embed + judge   │
//!              └────────────┘   └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall chunk book.md                        # inspect chunking
//! recall embed book.md                        # fill the embedding cache
//! recall status book.md                       # cache coverage
//! recall search book.md --keywords cat --query "feline pets"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | OpenAI, Ollama, and local embedding providers |
//! | [`judge`] | LLM relevance judges for reranking |
//! | [`sqlite_cache`] | Durable embedding cache |
//! | [`search`] | The `retrieve` entry point and `recall search` |
//! | [`embed_cmd`] | Cache fill and status commands |
//! | [`chunk`] | Chunking inspection command |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod http;
pub mod judge;
pub mod migrate;
pub mod search;
pub mod sqlite_cache;

pub use recall_harness_core as core;
pub use search::{RetrieveOptions, Retriever};
