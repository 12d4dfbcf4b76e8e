//! HTTP forwarding to the App API's ingest endpoint, with retry and
//! exponential backoff for transient failures.

use std::time::Duration;

use callrelay_core::domain::TranscriptEvent;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingest endpoint returned {status}")]
    Status { status: u16 },
}

#[derive(Debug, Serialize)]
struct IngestTranscriptBody<'a> {
    #[serde(rename = "callId")]
    call_id: &'a str,
    text: &'a str,
    ts: String,
    seq: u64,
}

pub struct Forwarder {
    client: reqwest::Client,
    app_base_url: String,
    max_retries: u8,
    retry_base_delay_ms: u64,
}

impl Forwarder {
    pub fn new(
        app_base_url: impl Into<String>,
        forward_timeout: Duration,
        max_retries: u8,
        retry_base_delay_ms: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(forward_timeout)
            .build()
            .expect("failed to build forwarder HTTP client");
        Self {
            client,
            app_base_url: app_base_url.into(),
            max_retries,
            retry_base_delay_ms,
        }
    }

    /// Forwards one transcript fragment, retrying server errors and network
    /// failures with exponential backoff. Client errors (4xx) fail
    /// immediately since a retry cannot change them.
    pub async fn forward(&self, event: &TranscriptEvent) -> Result<(), ForwardError> {
        let url = format!("{}/api/calls/ingest-transcript", self.app_base_url.trim_end_matches('/'));
        let body = IngestTranscriptBody {
            call_id: event.call_id.as_str(),
            text: &event.text,
            ts: event.created_at.to_rfc3339(),
            seq: event.seq,
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(self.retry_base_delay_ms * 2u64.pow(u32::from(attempt) - 1));
                tokio::time::sleep(delay).await;
            }

            match self.client.post(&url).json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(ForwardError::Status { status: status.as_u16() });
                        continue;
                    }
                    return Err(ForwardError::Status { status: status.as_u16() });
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        last_error = Some(ForwardError::Request(err));
                        continue;
                    }
                    return Err(ForwardError::Request(err));
                }
            }
        }

        Err(last_error.unwrap_or(ForwardError::Status { status: 0 }))
    }
}
