//! Reciprocal rank fusion.
//!
//! Each ranking contributes `1 / (K + rank)` for every key it contains,
//! where `rank` is the key's zero-based position in that ranking. Raw
//! scores are carried through for display but never influence the fused
//! order.

use std::collections::{HashMap, HashSet};

use crate::models::{FusedResult, RankedResult};

/// Damping constant for reciprocal rank fusion.
pub const RRF_K: f64 = 60.0;

/// Which scorer produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingSource {
    Keyword,
    Semantic,
}

/// A scorer's ranked output, best first.
#[derive(Debug, Clone, Copy)]
pub struct Ranking<'a> {
    pub source: RankingSource,
    pub results: &'a [RankedResult],
}

impl<'a> Ranking<'a> {
    pub fn keyword(results: &'a [RankedResult]) -> Self {
        Self {
            source: RankingSource::Keyword,
            results,
        }
    }

    pub fn semantic(results: &'a [RankedResult]) -> Self {
        Self {
            source: RankingSource::Semantic,
            results,
        }
    }
}

/// Fuse rankings with [`RRF_K`].
pub fn fuse(rankings: &[Ranking<'_>]) -> Vec<FusedResult> {
    fuse_with_k(rankings, RRF_K)
}

/// Fuse rankings into one list ordered by fused score, descending.
///
/// A key appearing twice in one ranking counts once, at its first
/// position. Ties keep the order in which keys were first encountered,
/// walking the rankings in the order given.
pub fn fuse_with_k(rankings: &[Ranking<'_>], k: f64) -> Vec<FusedResult> {
    let mut order: Vec<FusedResult> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for ranking in rankings {
        let mut seen: HashSet<&str> = HashSet::new();
        for (rank, item) in ranking.results.iter().enumerate() {
            if !seen.insert(item.key.as_str()) {
                continue;
            }
            let slot = *index.entry(item.key.as_str()).or_insert_with(|| {
                order.push(FusedResult::unscored(item.key.clone()));
                order.len() - 1
            });
            let entry = &mut order[slot];
            entry.fused_score += 1.0 / (k + rank as f64);
            match ranking.source {
                RankingSource::Keyword => entry.bm25_score = item.score,
                RankingSource::Semantic => entry.embedding_score = item.score,
            }
        }
    }

    let mut indexed: Vec<(usize, FusedResult)> = order.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        b.fused_score.total_cmp(&a.fused_score).then(ia.cmp(ib))
    });
    indexed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(keys: &[(&str, f64)]) -> Vec<RankedResult> {
        keys.iter()
            .map(|(k, s)| RankedResult {
                key: k.to_string(),
                score: *s,
            })
            .collect()
    }

    #[test]
    fn test_single_ranking_keeps_order() {
        let kw = ranked(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]);
        let fused = fuse(&[Ranking::keyword(&kw)]);
        let keys: Vec<&str> = fused.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!((fused[0].fused_score - 1.0 / 60.0).abs() < 1e-12);
        assert!((fused[1].fused_score - 1.0 / 61.0).abs() < 1e-12);
        assert_eq!(fused[0].bm25_score, 3.0);
        assert_eq!(fused[0].embedding_score, 0.0);
    }

    #[test]
    fn test_key_in_both_rankings_sums() {
        let sem = ranked(&[("x", 0.9), ("y", 0.5)]);
        let kw = ranked(&[("y", 4.0)]);
        let fused = fuse(&[Ranking::semantic(&sem), Ranking::keyword(&kw)]);
        assert_eq!(fused[0].key, "y");
        let expected = 1.0 / 61.0 + 1.0 / 60.0;
        assert!((fused[0].fused_score - expected).abs() < 1e-12);
        assert_eq!(fused[0].bm25_score, 4.0);
        assert_eq!(fused[0].embedding_score, 0.5);
        assert_eq!(fused[1].key, "x");
        assert_eq!(fused[1].bm25_score, 0.0);
    }

    #[test]
    fn test_raw_scores_do_not_affect_order() {
        let sem = ranked(&[("a", 0.0001), ("b", 0.00001)]);
        let kw = ranked(&[("b", 1000.0), ("a", 999.0)]);
        let fused = fuse(&[Ranking::semantic(&sem), Ranking::keyword(&kw)]);
        // equal fused scores; a was encountered first
        assert!((fused[0].fused_score - fused[1].fused_score).abs() < 1e-15);
        assert_eq!(fused[0].key, "a");
    }

    #[test]
    fn test_duplicate_key_in_ranking_counts_once() {
        let kw = ranked(&[("a", 2.0), ("a", 1.0), ("b", 0.5)]);
        let fused = fuse(&[Ranking::keyword(&kw)]);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].fused_score - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(fused[0].bm25_score, 2.0);
        assert!((fused[1].fused_score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_rankings() {
        assert!(fuse(&[]).is_empty());
        let none: Vec<RankedResult> = Vec::new();
        assert!(fuse(&[Ranking::keyword(&none), Ranking::semantic(&none)]).is_empty());
    }

    #[test]
    fn test_disjoint_rankings_interleave() {
        let a = ranked(&[("x", 10.0), ("y", 5.0)]);
        let b = ranked(&[("z", 9.0)]);
        let fused = fuse(&[Ranking::keyword(&a), Ranking::semantic(&b)]);
        let keys: Vec<&str> = fused.iter().map(|r| r.key.as_str()).collect();
        // x and z tie at rank 0; x comes from the first ranking
        assert_eq!(keys, vec!["x", "z", "y"]);
        assert!((fused[0].fused_score - 1.0 / 60.0).abs() < 1e-12);
        assert!((fused[1].fused_score - 1.0 / 60.0).abs() < 1e-12);
        assert!((fused[2].fused_score - 1.0 / 61.0).abs() < 1e-12);
        assert_eq!(fused[1].embedding_score, 9.0);
        assert_eq!(fused[1].bm25_score, 0.0);
    }

    #[test]
    fn test_custom_k() {
        let kw = ranked(&[("a", 1.0)]);
        let fused = fuse_with_k(&[Ranking::keyword(&kw)], 1.0);
        assert_eq!(fused[0].fused_score, 1.0);
    }
}
