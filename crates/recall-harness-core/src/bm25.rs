//! Okapi BM25 keyword scoring over a chunk set.
//!
//! Each chunk is one document. IDF is computed over the chunk set passed
//! in, not an external corpus:
//!
//! ```text
//! score(D, Q) = Σ IDF(q) · tf(q, D) · (k1 + 1) / (tf(q, D) + k1 · (1 − b + b · |D| / avgdl))
//! IDF(q)      = ln((N − n(q) + 0.5) / (n(q) + 0.5) + 1)
//! ```
//!
//! Tokens are split on any non-alphanumeric character, lowercased, and
//! folded to a singular form (`cats` → `cat`), so keywords match regardless
//! of case or simple plurals.

use std::collections::{HashMap, HashSet};

use crate::models::{rank_descending, Chunk, RankedResult};

pub const DEFAULT_K1: f64 = 1.2;
pub const DEFAULT_B: f64 = 0.75;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

/// Split text into normalized terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| fold_plural(t.to_lowercase()))
        .collect()
}

fn fold_plural(mut term: String) -> String {
    let len = term.chars().count();
    if len > 4 && term.ends_with("ies") {
        term.truncate(term.len() - 3);
        term.push('y');
    } else if len > 3
        && term.ends_with('s')
        && !term.ends_with("ss")
        && !term.ends_with("us")
        && !term.ends_with("is")
    {
        term.pop();
    }
    term
}

/// Score chunks against keywords with the default constants.
///
/// Returns only chunks with a non-zero score, sorted descending; ties keep
/// chunk order. An empty keyword list yields an empty result.
pub fn score_by_keywords<S: AsRef<str>>(chunks: &[Chunk], keywords: &[S]) -> Vec<RankedResult> {
    score_by_keywords_with(chunks, keywords, Bm25Params::default())
}

pub fn score_by_keywords_with<S: AsRef<str>>(
    chunks: &[Chunk],
    keywords: &[S],
    params: Bm25Params,
) -> Vec<RankedResult> {
    let mut seen = HashSet::new();
    let terms: Vec<String> = keywords
        .iter()
        .flat_map(|k| tokenize(k.as_ref()))
        .filter(|t| seen.insert(t.clone()))
        .collect();
    if terms.is_empty() || chunks.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.content)).collect();
    let total_len: usize = docs.iter().map(Vec::len).sum();
    if total_len == 0 {
        return Vec::new();
    }
    let n = docs.len() as f64;
    let avgdl = total_len as f64 / n;

    let term_freqs: Vec<HashMap<&str, usize>> = docs
        .iter()
        .map(|doc| {
            let mut tf = HashMap::new();
            for w in doc {
                *tf.entry(w.as_str()).or_insert(0) += 1;
            }
            tf
        })
        .collect();

    let idf: Vec<f64> = terms
        .iter()
        .map(|t| {
            let df = term_freqs
                .iter()
                .filter(|tf| tf.contains_key(t.as_str()))
                .count() as f64;
            ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
        })
        .collect();

    let scored: Vec<RankedResult> = chunks
        .iter()
        .zip(docs.iter().zip(term_freqs.iter()))
        .filter_map(|(chunk, (doc, tf))| {
            let norm = params.k1 * (1.0 - params.b + params.b * doc.len() as f64 / avgdl);
            let score: f64 = terms
                .iter()
                .zip(idf.iter())
                .map(|(t, idf)| {
                    let f = tf.get(t.as_str()).copied().unwrap_or(0) as f64;
                    if f == 0.0 {
                        0.0
                    } else {
                        idf * f * (params.k1 + 1.0) / (f + norm)
                    }
                })
                .sum();
            (score > 0.0).then(|| RankedResult {
                key: chunk.id.clone(),
                score,
            })
        })
        .collect();

    rank_descending(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::content_hash;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .map(|t| Chunk {
                id: content_hash(t),
                content: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        assert_eq!(
            tokenize("Hello, World! it's-fine"),
            vec!["hello", "world", "it", "s", "fine"]
        );
    }

    #[test]
    fn test_tokenize_folds_plurals() {
        assert_eq!(tokenize("cats dogs"), vec!["cat", "dog"]);
        assert_eq!(tokenize("stories glass bus"), vec!["story", "glass", "bus"]);
    }

    #[test]
    fn test_no_keywords_no_results() {
        let c = chunks(&["The cat sat on the mat.", "Dogs bark."]);
        let empty: Vec<String> = Vec::new();
        assert!(score_by_keywords(&c, &empty).is_empty());
        assert!(score_by_keywords(&c, &["   ", "!!"]).is_empty());
    }

    #[test]
    fn test_empty_chunks_no_results() {
        assert!(score_by_keywords(&[], &["cat"]).is_empty());
    }

    #[test]
    fn test_zero_overlap_excluded() {
        let c = chunks(&[
            "The cat sat on the mat.",
            "Dogs bark at cats.",
            "The weather is sunny today.",
        ]);
        let results = score_by_keywords(&c, &["cat"]);
        assert_eq!(results.len(), 2);
        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert!(keys.contains(&c[0].id.as_str()));
        assert!(keys.contains(&c[1].id.as_str()));
        assert!(!keys.contains(&c[2].id.as_str()));
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn test_case_insensitive() {
        let c = chunks(&["RUST is great", "python is fine"]);
        let results = score_by_keywords(&c, &["rust"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, c[0].id);
    }

    #[test]
    fn test_monotonic_in_term_frequency() {
        // same length, increasing tf of "cat"
        let c = chunks(&[
            "cat dog bird fish",
            "cat cat bird fish",
            "cat cat cat fish",
            "owl dog bird fish",
        ]);
        let results = score_by_keywords(&c, &["cat"]);
        let score_of = |i: usize| {
            results
                .iter()
                .find(|r| r.key == c[i].id)
                .map(|r| r.score)
                .unwrap()
        };
        assert!(score_of(1) >= score_of(0));
        assert!(score_of(2) >= score_of(1));
        assert_eq!(results[0].key, c[2].id);
    }

    #[test]
    fn test_rarer_term_scores_higher() {
        let c = chunks(&["apple banana", "apple cherry", "apple durian"]);
        let results = score_by_keywords(&c, &["apple", "cherry"]);
        assert_eq!(results[0].key, c[1].id);
    }

    #[test]
    fn test_ties_keep_chunk_order() {
        let c = chunks(&["alpha one", "beta two", "alpha six"]);
        let results = score_by_keywords(&c, &["alpha"]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].key, c[0].id);
        assert_eq!(results[1].key, c[2].id);
    }

    #[test]
    fn test_duplicate_keywords_counted_once() {
        let c = chunks(&["cat here", "no match"]);
        let once = score_by_keywords(&c, &["cat"]);
        let twice = score_by_keywords(&c, &["cat", "CAT", "cats"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_multi_word_keyword_is_tokenized() {
        let c = chunks(&["sunny weather today", "cat"]);
        let results = score_by_keywords(&c, &["sunny weather"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, c[0].id);
    }
}
