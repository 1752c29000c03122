//! `recall chunk`: show how a corpus splits under the current settings.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use recall_harness_core::chunk::ChunkSet;

use crate::config::Config;
use crate::search::{preview, read_corpus};

/// Size summary of a chunk set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub chunks: usize,
    pub avg_chars: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

pub fn summarize(chunks: &ChunkSet) -> ChunkSummary {
    let lengths: Vec<usize> = chunks.iter().map(|c| c.content.chars().count()).collect();
    let total: usize = lengths.iter().sum();
    ChunkSummary {
        chunks: lengths.len(),
        avg_chars: if lengths.is_empty() {
            0
        } else {
            total / lengths.len()
        },
        min_chars: lengths.iter().copied().min().unwrap_or(0),
        max_chars: lengths.iter().copied().max().unwrap_or(0),
    }
}

pub fn run_chunk(config: &Config, corpus_path: &Path, sample: usize, json: bool) -> Result<()> {
    let corpus = read_corpus(corpus_path)?;
    let params = config.chunking.params();
    let chunks = ChunkSet::new(recall_harness_core::chunk::chunk_text(&corpus, &params)?);
    let summary = summarize(&chunks);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("chunk {}", corpus_path.display());
    println!(
        "  chunk_size: {}  overlap: {}  separators: {:?}",
        params.chunk_size, config.chunking.chunk_overlap, config.chunking.separators
    );
    println!("  chunks: {}", summary.chunks);
    println!(
        "  chars: avg {}  min {}  max {}",
        summary.avg_chars, summary.min_chars, summary.max_chars
    );

    for chunk in chunks.iter().take(sample) {
        println!();
        println!("  [{}]", &chunk.id[..12.min(chunk.id.len())]);
        println!("    {}", preview(&chunk.content, 120));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_harness_core::chunk::{chunk_text, ChunkingParams};

    #[test]
    fn test_summarize() {
        let chunks = ChunkSet::new(
            chunk_text(
                "The cat sat on the mat.\n\nDogs bark at cats.",
                &ChunkingParams::new(30, 0),
            )
            .unwrap(),
        );
        let summary = summarize(&chunks);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.min_chars, 18);
        assert_eq!(summary.max_chars, 23);
        assert_eq!(summary.avg_chars, 20);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&ChunkSet::default());
        assert_eq!(summary.chunks, 0);
        assert_eq!(summary.avg_chars, 0);
    }
}
