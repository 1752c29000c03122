//! Deterministic collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::bm25::tokenize;
use crate::embedding::EmbeddingProvider;
use crate::models::Chunk;
use crate::rerank::{Judgment, JudgmentCollaborator};

/// Terms that get their own vector dimension. The last dimension is a
/// constant bias so no vector has zero magnitude.
pub const VOCAB: &[&str] = &["cat", "dog", "mat", "bark", "weather", "sunny", "rust"];

/// Embeds text as term counts over [`VOCAB`].
pub struct FakeProvider {
    calls: AtomicUsize,
    embedded: AtomicUsize,
    fail_on: Option<String>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            embedded: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// A provider that errors on any batch containing `word`.
    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut v: Vec<f32> = VOCAB
            .iter()
            .map(|term| tokens.iter().filter(|t| t.as_str() == *term).count() as f32)
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    fn model_name(&self) -> &str {
        "fake-model"
    }

    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(word) = &self.fail_on {
            if texts.iter().any(|t| t.contains(word.as_str())) {
                bail!("provider rejected batch containing '{}'", word);
            }
        }
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Approves candidates containing a word, rejects the rest, and fails on
/// any candidate containing `"explode"`.
pub struct FakeJudge {
    approve_word: String,
    calls: AtomicUsize,
}

impl FakeJudge {
    pub fn approving(word: &str) -> Self {
        Self {
            approve_word: word.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgmentCollaborator for FakeJudge {
    async fn judge(&self, candidate: &Chunk, _query: &str) -> Result<Judgment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if candidate.content.contains("explode") {
            bail!("judge blew up");
        }
        if candidate.content.contains(self.approve_word.as_str()) {
            Ok(Judgment::Approve)
        } else {
            Ok(Judgment::Reject)
        }
    }
}

pub fn chunk(text: &str) -> Chunk {
    Chunk {
        id: crate::chunk::content_hash(text),
        content: text.to_string(),
    }
}
