//! `GET /api/transcripts/latest`.

use axum::extract::{Query, State};
use axum::Json;
use callrelay_core::domain::{CallId, KbArticle, Utterance};
use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestTranscriptQuery {
    #[serde(rename = "callId")]
    pub call_id: String,
}

#[derive(Debug, Serialize)]
pub struct LatestTranscriptResponse {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub utterances: Vec<Utterance>,
    pub intent: Option<String>,
    pub confidence: Option<f32>,
    pub articles: Vec<KbArticle>,
}

pub async fn latest_transcript(
    State(state): State<AppState>,
    Query(query): Query<LatestTranscriptQuery>,
) -> Result<Json<LatestTranscriptResponse>, HttpError> {
    let call_id = CallId::new(query.call_id.clone());

    let utterances = state.repos.utterances.list_for_call(&call_id).await?;
    let latest_intent = state.repos.intents.latest_for_call(&call_id).await?;

    let (intent, confidence, articles) = match latest_intent {
        Some(intent) if intent.meets_floor() => {
            let articles = state
                .repos
                .kb
                .search_by_tags(std::slice::from_ref(&intent.label), 3)
                .await?;
            (Some(intent.label), Some(intent.confidence), articles)
        }
        Some(intent) => (Some(intent.label), Some(intent.confidence), Vec::new()),
        None => (None, None, Vec::new()),
    };

    Ok(Json(LatestTranscriptResponse {
        call_id: call_id.to_string(),
        utterances,
        intent,
        confidence,
        articles,
    }))
}
