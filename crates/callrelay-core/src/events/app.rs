//! `AppEvent` is the SSE wire union broadcast by the SSE Hub. Each
//! variant's name matches the SSE `event:` field the browser listens for.

use crate::domain::{CallId, Disposition, KbArticle};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum AppEvent {
    Hello {
        call_id: CallId,
    },
    TranscriptLine {
        call_id: CallId,
        seq: u64,
        text: String,
        speaker: String,
    },
    IntentUpdate {
        call_id: CallId,
        intent: String,
        confidence: f32,
        articles: Vec<KbArticle>,
    },
    CallEnd {
        call_id: CallId,
        disposition: Disposition,
    },
    Ping,
}

impl AppEvent {
    /// The SSE `event:` field name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::Hello { .. } => "hello",
            AppEvent::TranscriptLine { .. } => "transcript_line",
            AppEvent::IntentUpdate { .. } => "intent_update",
            AppEvent::CallEnd { .. } => "call_end",
            AppEvent::Ping => "ping",
        }
    }

    /// JSON payload for the SSE `data:` field.
    pub fn data_json(&self) -> serde_json::Value {
        let wrapped = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        wrapped
            .get("data")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}
