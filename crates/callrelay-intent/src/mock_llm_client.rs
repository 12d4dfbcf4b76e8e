//! Deterministic `LlmClient` used in tests and the `ASR_PROVIDER=mock`-style
//! dev setup, so Intent+KB and Disposition logic can be exercised without a
//! real LLM.

use async_trait::async_trait;

use crate::llm_client::{ClassifyResult, LlmClient, LlmError, SummaryResult};

pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResult, LlmError> {
        let lower = prompt.to_lowercase();
        let (intent, confidence) = if lower.contains("cancel") {
            ("cancellation", 0.9)
        } else if lower.contains("refund") || lower.contains("charge") {
            ("billing_dispute", 0.85)
        } else if lower.contains("fraud") || lower.contains("unauthorized") {
            ("fraud_report", 0.92)
        } else {
            ("unknown", 0.0)
        };
        Ok(ClassifyResult {
            intent: intent.to_string(),
            confidence,
        })
    }

    async fn summarize(&self, prompt: &str) -> Result<SummaryResult, LlmError> {
        Ok(SummaryResult {
            issue: "Customer reported an issue with their account".to_string(),
            resolution: "Issue was addressed during the call".to_string(),
            next_steps: "No further action required".to_string(),
            confidence: if prompt.is_empty() { 0.2 } else { 0.7 },
            categories: vec!["general_inquiry".to_string()],
        })
    }
}
