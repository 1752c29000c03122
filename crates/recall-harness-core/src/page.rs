//! Page slicing and summary statistics for reranked results.

use serde::Serialize;

use crate::models::RerankedResult;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageStats {
    /// Results across all pages.
    pub total: usize,
    /// Mean content length in characters over all results, rounded.
    pub avg_chars: usize,
    pub page_count: usize,
    pub current_page: usize,
    /// Lowest fused score on this page, `0.0` for an empty page.
    pub min_score: f64,
    pub max_score: f64,
}

/// A result with its 0-based position in the full list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult {
    pub index: usize,
    #[serde(flatten)]
    pub result: RerankedResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub results: Vec<PagedResult>,
    pub stats: PageStats,
}

/// Slice out page `page` (1-based) of `page_size` results.
///
/// `page` and `page_size` are clamped to at least 1. A page past the end
/// is empty but still reports totals.
pub fn paginate(results: &[RerankedResult], page: usize, page_size: usize) -> SearchPage {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = results.len();

    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);

    let page_results: Vec<PagedResult> = results[start..end]
        .iter()
        .enumerate()
        .map(|(i, r)| PagedResult {
            index: start + i,
            result: r.clone(),
        })
        .collect();

    let scores = page_results.iter().map(|r| r.result.result.fused_score);
    let (min_score, max_score) = if page_results.is_empty() {
        (0.0, 0.0)
    } else {
        scores.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s), hi.max(s))
        })
    };

    let total_chars: usize = results.iter().map(|r| r.content.chars().count()).sum();
    let avg_chars = if total == 0 {
        0
    } else {
        (total_chars as f64 / total as f64).round() as usize
    };

    SearchPage {
        results: page_results,
        stats: PageStats {
            total,
            avg_chars,
            page_count: total.div_ceil(page_size),
            current_page: page,
            min_score,
            max_score,
        },
    }
}
