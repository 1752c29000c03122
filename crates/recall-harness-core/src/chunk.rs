//! Recursive-boundary text chunker and memoized chunk store.
//!
//! Splits corpus text into overlapping [`Chunk`]s no longer than
//! `chunk_size` characters. Splitting prefers the largest structural
//! separator present in the text and only recurses into smaller separators
//! (paragraph → line → word → character) for segments that are still too
//! large.
//!
//! Each chunk's id is the SHA-256 of its text, so identical text always
//! yields the same id and cached embeddings survive re-chunking.
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (`""` always matches).
//! 2. Split on it, keeping the separator at the start of the following piece.
//! 3. Pieces shorter than `chunk_size` are buffered; an oversized piece
//!    flushes the buffer and is split again with the remaining separators.
//! 4. Buffered pieces are merged greedily up to `chunk_size`. When a chunk is
//!    emitted, pieces are dropped from the front of the buffer until at most
//!    `chunk_overlap` characters remain, and those carry into the next chunk.
//! 5. Emitted chunks are trimmed; empty chunks and repeated ids are dropped.
//!
//! # Example
//!
//! ```rust
//! use recall_harness_core::chunk::{chunk_text, ChunkingParams};
//!
//! let params = ChunkingParams::new(30, 0);
//! let chunks = chunk_text("The cat sat.\n\nDogs bark.", &params).unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::RetrievalError;
use crate::models::Chunk;

/// Paragraph, line, word, character.
pub const PLAIN_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Markdown structure first, then the plain fallbacks.
pub const MARKDOWN_SEPARATORS: &[&str] = &[
    "\n--- CHAPTER ---\n",
    "\n## ",
    "\n### ",
    "\n#### ",
    "\n##### ",
    "\n###### ",
    "```\n\n",
    "\n\n***\n\n",
    "\n\n---\n\n",
    "\n\n___\n\n",
    "\n\n",
    "\n",
    " ",
    "",
];

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Named separator sets selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPreset {
    #[default]
    Plain,
    Markdown,
}

impl SeparatorPreset {
    pub fn separators(&self) -> &'static [&'static str] {
        match self {
            Self::Plain => PLAIN_SEPARATORS,
            Self::Markdown => MARKDOWN_SEPARATORS,
        }
    }
}

/// Chunk size, overlap (both in characters), and separator priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl ChunkingParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: PLAIN_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_preset(mut self, preset: SeparatorPreset) -> Self {
        self.separators = preset.separators().iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.chunk_size == 0 {
            return Err(RetrievalError::Chunking(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RetrievalError::Chunking(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.is_empty() {
            return Err(RetrievalError::Chunking(
                "at least one separator is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

/// Split corpus text into content-addressed chunks.
///
/// # Guarantees
///
/// - Identical text and parameters always produce identical chunks.
/// - No chunk exceeds `chunk_size` characters unless a single unsplittable
///   piece does (only possible when `""` is not among the separators).
/// - Chunk ids are unique; a repeated segment keeps its first position.
///
/// # Errors
///
/// [`RetrievalError::Chunking`] for invalid parameters or a corpus that is
/// empty or whitespace-only.
pub fn chunk_text(corpus: &str, params: &ChunkingParams) -> Result<Vec<Chunk>, RetrievalError> {
    params.validate()?;
    if corpus.trim().is_empty() {
        return Err(RetrievalError::Chunking("corpus text is empty".to_string()));
    }

    let separators: Vec<&str> = params.separators.iter().map(String::as_str).collect();
    let pieces = split_recursive(corpus, &separators, params);

    let mut seen = HashSet::new();
    Ok(pieces
        .iter()
        .map(|piece| make_chunk(piece))
        .filter(|chunk| seen.insert(chunk.id.clone()))
        .collect())
}

/// Hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(text: &str) -> Chunk {
    Chunk {
        id: content_hash(text),
        content: text.to_string(),
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], params: &ChunkingParams) -> Vec<String> {
    let (separator, finer) = pick_separator(text, separators);
    let mut out = Vec::new();
    let mut buffered: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < params.chunk_size {
            buffered.push(piece);
            continue;
        }
        if !buffered.is_empty() {
            out.extend(merge_pieces(&buffered, params));
            buffered.clear();
        }
        if finer.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        } else {
            out.extend(split_recursive(piece, finer, params));
        }
    }

    if !buffered.is_empty() {
        out.extend(merge_pieces(&buffered, params));
    }
    out
}

/// The first separator present in `text`, plus the finer separators after it.
fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn merge_pieces(pieces: &[&str], params: &ChunkingParams) -> Vec<String> {
    let mut docs = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > params.chunk_size && !window.is_empty() {
            if let Some(doc) = join_window(&window) {
                docs.push(doc);
            }
            while total > params.chunk_overlap || (total + len > params.chunk_size && total > 0) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }

    if let Some(doc) = join_window(&window) {
        docs.push(doc);
    }
    docs
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// An ordered, id-indexed set of chunks: the universe for one corpus version.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    chunks: Vec<Chunk>,
    index: HashMap<String, usize>,
}

impl ChunkSet {
    /// Build a set, dropping chunks whose id was already seen.
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let mut index = HashMap::with_capacity(chunks.len());
        let mut unique = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if index.contains_key(&chunk.id) {
                continue;
            }
            index.insert(chunk.id.clone(), unique.len());
            unique.push(chunk);
        }
        Self {
            chunks: unique,
            index,
        }
    }

    pub fn as_slice(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.index.get(id).map(|&i| &self.chunks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }
}

/// Chunks a corpus once and hands out the same [`ChunkSet`] until the
/// corpus text changes.
pub struct ChunkStore {
    params: ChunkingParams,
    memo: RwLock<Option<(String, Arc<ChunkSet>)>>,
}

impl ChunkStore {
    pub fn new(params: ChunkingParams) -> Result<Self, RetrievalError> {
        params.validate()?;
        Ok(Self {
            params,
            memo: RwLock::new(None),
        })
    }

    /// Return the chunk set for `corpus`, chunking it on first use.
    pub fn chunks(&self, corpus: &str) -> Result<Arc<ChunkSet>, RetrievalError> {
        let fingerprint = content_hash(corpus);
        {
            let memo = self.memo.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((fp, set)) = memo.as_ref() {
                if *fp == fingerprint {
                    return Ok(Arc::clone(set));
                }
            }
        }

        let set = Arc::new(ChunkSet::new(chunk_text(corpus, &self.params)?));
        tracing::debug!(chunks = set.len(), "chunked corpus");
        let mut memo = self.memo.write().unwrap_or_else(PoisonError::into_inner);
        *memo = Some((fingerprint, Arc::clone(&set)));
        Ok(set)
    }
}
