#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;

use recall_harness::core::embedding::EmbeddingProvider;
use recall_harness::core::models::Chunk;
use recall_harness::core::rerank::{Judgment, JudgmentCollaborator};

pub const CORPUS: &str =
    "The cat sat on the mat.\n\nDogs bark at cats.\n\nThe weather is sunny today.";

/// Maps a few words onto concept axes: cat-like, dog-like, weather. The
/// last axis is a constant bias.
fn concept(word: &str) -> [f32; 3] {
    match word {
        "cat" | "cats" | "feline" | "kitten" => [1.0, 0.0, 0.0],
        "dog" | "dogs" | "bark" | "puppy" => [0.0, 1.0, 0.0],
        "pet" | "pets" => [0.5, 0.5, 0.0],
        "weather" | "sunny" | "rain" => [0.0, 0.0, 1.0],
        _ => [0.0, 0.0, 0.0],
    }
}

pub struct ConceptProvider {
    calls: AtomicUsize,
    embedded: AtomicUsize,
    fail_on: Option<String>,
}

impl ConceptProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            embedded: AtomicUsize::new(0),
            fail_on: None,
        }
    }

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
        let mut v = vec![0.0f32, 0.0, 0.0, 0.1];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let c = concept(&word.to_lowercase());
            for i in 0..3 {
                v[i] += c[i];
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for ConceptProvider {
    fn model_name(&self) -> &str {
        "concept"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(word) = &self.fail_on {
            if texts.iter().any(|t| t.contains(word.as_str())) {
                bail!("provider unavailable for '{}'", word);
            }
        }
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Approves candidates containing `word`; fails on `"explode"`.
pub struct WordJudge {
    word: String,
    calls: AtomicUsize,
}

impl WordJudge {
    pub fn approving(word: &str) -> Self {
        Self {
            word: word.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgmentCollaborator for WordJudge {
    async fn judge(&self, candidate: &Chunk, _query: &str) -> Result<Judgment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if candidate.content.contains("explode") {
            bail!("judge failed");
        }
        if candidate.content.to_lowercase().contains(self.word.as_str()) {
            Ok(Judgment::Approve)
        } else {
            Ok(Judgment::Reject)
        }
    }
}
