//! Core data types that flow through a retrieval pass.
//!
//! Every scorer produces [`RankedResult`]s keyed by chunk id. Fusion turns
//! several rankings into [`FusedResult`]s, and the reranker attaches a
//! [`RerankVerdict`] to produce the final [`RerankedResult`] list.

use serde::{Deserialize, Serialize};

/// Hex-encoded SHA-256 of a chunk's text.
pub type ContentHash = String;

/// A content-addressed segment of the corpus.
///
/// `id` is derived from `content` alone, so identical text always maps to
/// the same id across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ContentHash,
    pub content: String,
}

/// A cached embedding for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub content: String,
    pub vector: Vec<f32>,
}

/// One entry of a scorer's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub key: ContentHash,
    pub score: f64,
}

/// Per-query aggregate produced by rank fusion.
///
/// `fused_score` depends only on ranks; the raw component scores are kept
/// for display and are `0.0` when the key was absent from that ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub key: ContentHash,
    pub bm25_score: f64,
    pub embedding_score: f64,
    pub fused_score: f64,
}

impl FusedResult {
    /// A result with every score zeroed.
    pub fn unscored(key: impl Into<ContentHash>) -> Self {
        Self {
            key: key.into(),
            bm25_score: 0.0,
            embedding_score: 0.0,
            fused_score: 0.0,
        }
    }
}

/// Outcome of the reranking stage for one candidate.
///
/// `NotPassed` means the candidate was never judged, either because it fell
/// outside the cutoff or because its judgment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankVerdict {
    Approved,
    Rejected,
    NotPassed,
}

impl RerankVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NotPassed => "not-passed",
        }
    }
}

impl std::fmt::Display for RerankVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fused result with its chunk text and rerank verdict attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankedResult {
    #[serde(flatten)]
    pub result: FusedResult,
    pub content: String,
    pub verdict: RerankVerdict,
}

/// Sort results by score, descending.
///
/// Ties keep their input order: the original position is used as an
/// explicit secondary key rather than relying on sort stability.
pub fn rank_descending(results: Vec<RankedResult>) -> Vec<RankedResult> {
    let mut indexed: Vec<(usize, RankedResult)> = results.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.score.total_cmp(&a.score).then(ia.cmp(ib)));
    indexed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(key: &str, score: f64) -> RankedResult {
        RankedResult {
            key: key.to_string(),
            score,
        }
    }

    #[test]
    fn test_rank_descending_orders_by_score() {
        let out = rank_descending(vec![ranked("a", 1.0), ranked("b", 3.0), ranked("c", 2.0)]);
        let keys: Vec<&str> = out.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_descending_ties_keep_input_order() {
        let out = rank_descending(vec![
            ranked("first", 1.0),
            ranked("top", 5.0),
            ranked("second", 1.0),
            ranked("third", 1.0),
        ]);
        let keys: Vec<&str> = out.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_verdict_serializes_kebab_case() {
        let json = serde_json::to_string(&RerankVerdict::NotPassed).unwrap();
        assert_eq!(json, "\"not-passed\"");
        assert_eq!(RerankVerdict::Approved.to_string(), "approved");
    }

    #[test]
    fn test_reranked_result_flattens_scores() {
        let r = RerankedResult {
            result: FusedResult::unscored("abc"),
            content: "text".to_string(),
            verdict: RerankVerdict::Rejected,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["key"], "abc");
        assert_eq!(json["fused_score"], 0.0);
        assert_eq!(json["verdict"], "rejected");
    }
}
