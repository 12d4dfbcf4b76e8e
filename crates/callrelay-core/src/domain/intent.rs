//! Intent classification and knowledge-base retrieval results.

use crate::domain::call::CallId;
use serde::{Deserialize, Serialize};

/// Minimum confidence required before an intent triggers a KB lookup and
/// broadcast.
pub const INTENT_CONFIDENCE_FLOOR: f32 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub call_id: CallId,
    pub seq: u64,
    pub label: String,
    pub confidence: f32,
}

impl Intent {
    pub fn unknown(call_id: CallId, seq: u64) -> Self {
        Self {
            call_id,
            seq,
            label: "unknown".to_string(),
            confidence: 0.0,
        }
    }

    pub fn meets_floor(&self) -> bool {
        self.label != "unknown" && self.confidence >= INTENT_CONFIDENCE_FLOOR
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbArticle {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub score: f32,
}
