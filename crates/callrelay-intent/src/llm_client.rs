//! `LlmClient` port: both the Intent+KB classifier and the Disposition
//! summarizer go through it, so tests can swap in `MockLlmClient` without
//! touching either service's logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited")]
    RateLimited,

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub intent: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub issue: String,
    pub resolution: String,
    #[serde(rename = "nextSteps")]
    pub next_steps: String,
    pub confidence: f32,
    pub categories: Vec<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Classifies the intent of a compact transcript prompt.
    async fn classify(&self, prompt: &str) -> Result<ClassifyResult, LlmError>;

    /// Summarizes a full call transcript into a disposition.
    async fn summarize(&self, prompt: &str) -> Result<SummaryResult, LlmError>;
}
