//! HTTP-backed `LlmClient`: POSTs a prompt to an OpenAI-compatible chat
//! completions endpoint and parses the model's JSON reply.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm_client::{ClassifyResult, LlmClient, LlmError, SummaryResult};

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: String,
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
                "response_format": {"type": "json_object"},
            }))
            .send()
            .await
            .map_err(|e| LlmError::Upstream(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(LlmError::Upstream(format!("status {}", resp.status())));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("no choices in response".into()))
    }
}

const CLASSIFY_SYSTEM_PROMPT: &str = "You classify the caller's intent from a call transcript. \
Respond with a JSON object: {\"intent\": string, \"confidence\": number between 0 and 1}.";

const SUMMARIZE_SYSTEM_PROMPT: &str = "You summarize a completed support call. \
Respond with a JSON object: {\"issue\": string, \"resolution\": string, \"nextSteps\": string, \
\"confidence\": number, \"categories\": array of up to 3 strings}.";

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResult, LlmError> {
        let content = self.chat_completion(CLASSIFY_SYSTEM_PROMPT, prompt).await?;
        serde_json::from_str(&content).map_err(|e| LlmError::MalformedResponse(e.to_string()))
    }

    async fn summarize(&self, prompt: &str) -> Result<SummaryResult, LlmError> {
        let content = self.chat_completion(SUMMARIZE_SYSTEM_PROMPT, prompt).await?;
        serde_json::from_str(&content).map_err(|e| LlmError::MalformedResponse(e.to_string()))
    }
}
