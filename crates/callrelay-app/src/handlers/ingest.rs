//! `/api/transcripts/receive` and `/api/calls/ingest-transcript`:
//! two request shapes feeding the same ingest pipeline.

use axum::extract::State;
use axum::Json;
use callrelay_core::domain::{CallId, Speaker};
use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::handlers::pipeline::{process_fragment, IncomingFragment};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReceiveTranscriptBody {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub transcript: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub asr_service: String,
    pub timestamp: String,
    #[serde(rename = "isFinal", default)]
    pub is_final: bool,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    #[serde(rename = "callId")]
    pub call_id: String,
    pub seq: u64,
}

pub async fn receive_transcript(
    State(state): State<AppState>,
    Json(body): Json<ReceiveTranscriptBody>,
) -> Result<Json<IngestResponse>, HttpError> {
    if body.transcript.trim().is_empty() {
        return Err(HttpError::BadRequest("transcript must not be empty".into()));
    }

    let call_id = CallId::new(body.call_id.clone());
    let fragment = IncomingFragment {
        call_id: call_id.clone(),
        text: body.transcript,
        seq: None,
        speaker: None,
    };

    let seq = process_fragment(&state, fragment).await?;

    Ok(Json(IngestResponse {
        ok: true,
        call_id: call_id.to_string(),
        seq,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IngestTranscriptBody {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

pub async fn ingest_transcript(
    State(state): State<AppState>,
    Json(body): Json<IngestTranscriptBody>,
) -> Result<Json<IngestResponse>, HttpError> {
    if body.text.trim().is_empty() {
        return Err(HttpError::BadRequest("text must not be empty".into()));
    }

    let call_id = CallId::new(body.call_id.clone());
    let fragment = IncomingFragment {
        call_id: call_id.clone(),
        text: body.text,
        seq: body.seq,
        speaker: body.speaker.as_deref().map(Speaker::parse),
    };

    let seq = process_fragment(&state, fragment).await?;

    Ok(Json(IngestResponse {
        ok: true,
        call_id: call_id.to_string(),
        seq,
    }))
}
