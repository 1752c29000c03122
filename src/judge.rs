//! LLM-backed relevance judges for the reranker.
//!
//! Each candidate is sent with the query to a chat model that must answer
//! with a single word: `approve` or `reject`. Replies are parsed leniently
//! (`yes`/`relevant` also approve, `no`/`irrelevant` also reject); anything
//! else is an error, which the reranker turns into `not-passed`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use recall_harness_core::models::Chunk;
use recall_harness_core::rerank::{Judgment, JudgmentCollaborator};

use crate::config::RerankConfig;
use crate::http::{build_client, post_json, JsonEndpoint};

const SYSTEM_PROMPT: &str = "You judge whether a passage helps answer a search query. \
Reply with exactly one word: approve if the passage is relevant to the query, \
reject if it is not.";

fn user_prompt(candidate: &Chunk, query: &str) -> String {
    format!("Query:\n{}\n\nPassage:\n{}", query, candidate.content)
}

/// Map a model reply to a judgment.
pub fn parse_judgment(reply: &str) -> Result<Judgment> {
    let word = reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match word.as_str() {
        "approve" | "approved" | "yes" | "relevant" => Ok(Judgment::Approve),
        "reject" | "rejected" | "no" | "irrelevant" => Ok(Judgment::Reject),
        _ => bail!("unrecognized judgment reply: {:?}", reply),
    }
}

// ============ OpenAI Judge ============

/// Judges via `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAIJudge {
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIJudge {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            client: build_client(config.timeout())?,
        })
    }
}

#[async_trait]
impl JudgmentCollaborator for OpenAIJudge {
    async fn judge(&self, candidate: &Chunk, query: &str) -> Result<Judgment> {
        let endpoint = JsonEndpoint {
            service: "OpenAI",
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            bearer: Some(&self.api_key),
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": 3,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(candidate, query)},
            ],
        });
        let json = post_json(&self.client, &endpoint, &body).await?;
        let reply = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;
        parse_judgment(reply)
    }
}

// ============ Ollama Judge ============

/// Judges via Ollama's `POST /api/chat` with streaming disabled.
pub struct OllamaJudge {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaJudge {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            client: build_client(config.timeout())?,
        })
    }
}

#[async_trait]
impl JudgmentCollaborator for OllamaJudge {
    async fn judge(&self, candidate: &Chunk, query: &str) -> Result<Judgment> {
        let endpoint = JsonEndpoint {
            service: "Ollama",
            url: format!("{}/api/chat", self.url.trim_end_matches('/')),
            bearer: None,
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "options": {"temperature": 0},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(candidate, query)},
            ],
        });
        let json = post_json(&self.client, &endpoint, &body).await?;
        let reply = json
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))?;
        parse_judgment(reply)
    }
}

/// Bounds each judgment by a deadline; an overrun is an error.
pub struct TimeoutJudge<J> {
    inner: J,
    timeout: Duration,
}

impl<J> TimeoutJudge<J> {
    pub fn new(inner: J, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<J: JudgmentCollaborator> JudgmentCollaborator for TimeoutJudge<J> {
    async fn judge(&self, candidate: &Chunk, query: &str) -> Result<Judgment> {
        match tokio::time::timeout(self.timeout, self.inner.judge(candidate, query)).await {
            Ok(result) => result,
            Err(_) => bail!("judgment timed out after {:?}", self.timeout),
        }
    }
}

/// Build the configured judge, or `None` when reranking is disabled.
pub fn create_judge(config: &RerankConfig) -> Result<Option<Arc<dyn JudgmentCollaborator>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    let timeout = config.timeout();
    match config.provider.as_str() {
        "openai" => Ok(Some(Arc::new(TimeoutJudge::new(
            OpenAIJudge::new(config)?,
            timeout,
        )))),
        "ollama" => Ok(Some(Arc::new(TimeoutJudge::new(
            OllamaJudge::new(config)?,
            timeout,
        )))),
        other => bail!("Unknown rerank provider: {}", other),
    }
}
