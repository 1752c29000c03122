//! Verdict-based reranking of fused candidates.
//!
//! The top `cutoff` fused results are submitted to a
//! [`JudgmentCollaborator`]; the rest pass through as
//! [`RerankVerdict::NotPassed`]. A failed judgment also yields
//! `NotPassed`. Every input candidate appears exactly once in the output.

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::ChunkSet;
use crate::error::RetrievalError;
use crate::models::{Chunk, FusedResult, RerankVerdict, RerankedResult};

pub const DEFAULT_CUTOFF: usize = 30;
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A binary relevance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Approve,
    Reject,
}

/// External relevance check for one candidate.
#[async_trait]
pub trait JudgmentCollaborator: Send + Sync {
    async fn judge(&self, candidate: &Chunk, query: &str) -> Result<Judgment>;
}

/// How verdicts order the final list. Within a tier, fused rank is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictOrdering {
    /// approved, rejected, not-passed
    #[default]
    Verdict,
    /// approved, not-passed, rejected
    RejectedLast,
    /// fused order; verdicts are labels only
    Fused,
}

impl VerdictOrdering {
    fn tier(&self, verdict: RerankVerdict) -> u8 {
        match (self, verdict) {
            (Self::Fused, _) => 0,
            (_, RerankVerdict::Approved) => 0,
            (Self::Verdict, RerankVerdict::Rejected) => 1,
            (Self::Verdict, RerankVerdict::NotPassed) => 2,
            (Self::RejectedLast, RerankVerdict::NotPassed) => 1,
            (Self::RejectedLast, RerankVerdict::Rejected) => 2,
        }
    }
}

impl FromStr for VerdictOrdering {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "verdict" => Ok(Self::Verdict),
            "rejected-last" => Ok(Self::RejectedLast),
            "fused" => Ok(Self::Fused),
            other => anyhow::bail!(
                "unknown rerank ordering '{}'; expected verdict, rejected-last, or fused",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RerankOptions {
    /// How many top candidates are judged.
    pub cutoff: usize,
    /// Judgments in flight at once.
    pub concurrency: usize,
    pub ordering: VerdictOrdering,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            concurrency: DEFAULT_CONCURRENCY,
            ordering: VerdictOrdering::default(),
        }
    }
}

/// Judge the top `options.cutoff` candidates and reorder by verdict.
pub async fn rerank(
    fused: Vec<FusedResult>,
    chunks: &ChunkSet,
    query: &str,
    judge: &dyn JudgmentCollaborator,
    options: &RerankOptions,
) -> Vec<RerankedResult> {
    let cutoff = options.cutoff.min(fused.len());
    let concurrency = options.concurrency.max(1);

    let verdicts: Vec<RerankVerdict> = stream::iter(fused[..cutoff].iter())
        .map(|result| judge_one(result, chunks, query, judge))
        .buffered(concurrency)
        .collect()
        .await;

    let approved = verdicts
        .iter()
        .filter(|v| **v == RerankVerdict::Approved)
        .count();
    debug!(judged = cutoff, approved, "rerank complete");

    let labelled = fused.into_iter().enumerate().map(|(i, result)| {
        let verdict = verdicts.get(i).copied().unwrap_or(RerankVerdict::NotPassed);
        attach(result, chunks, verdict)
    });
    order_by_verdict(labelled.collect(), options.ordering)
}

/// Label every candidate `NotPassed` without judging.
pub fn pass_through(fused: Vec<FusedResult>, chunks: &ChunkSet) -> Vec<RerankedResult> {
    fused
        .into_iter()
        .map(|r| attach(r, chunks, RerankVerdict::NotPassed))
        .collect()
}

async fn judge_one(
    result: &FusedResult,
    chunks: &ChunkSet,
    query: &str,
    judge: &dyn JudgmentCollaborator,
) -> RerankVerdict {
    let Some(chunk) = chunks.get(&result.key) else {
        warn!(chunk_id = %result.key, "candidate not in chunk set; not judged");
        return RerankVerdict::NotPassed;
    };
    match judge.judge(chunk, query).await {
        Ok(Judgment::Approve) => RerankVerdict::Approved,
        Ok(Judgment::Reject) => RerankVerdict::Rejected,
        Err(e) => {
            let err = RetrievalError::Judgment {
                chunk_id: result.key.clone(),
                reason: format!("{:#}", e),
            };
            warn!("{}; marking not-passed", err);
            RerankVerdict::NotPassed
        }
    }
}

fn attach(result: FusedResult, chunks: &ChunkSet, verdict: RerankVerdict) -> RerankedResult {
    let content = chunks
        .get(&result.key)
        .map(|c| c.content.clone())
        .unwrap_or_default();
    RerankedResult {
        result,
        content,
        verdict,
    }
}

fn order_by_verdict(results: Vec<RerankedResult>, ordering: VerdictOrdering) -> Vec<RerankedResult> {
    let mut indexed: Vec<(usize, RerankedResult)> = results.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        ordering
            .tier(a.verdict)
            .cmp(&ordering.tier(b.verdict))
            .then(ia.cmp(ib))
    });
    indexed.into_iter().map(|(_, r)| r).collect()
}
