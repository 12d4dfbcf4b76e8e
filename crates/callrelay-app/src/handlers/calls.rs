//! `POST /api/calls/end` and `POST /api/calls/:callId/dispose`.

use axum::extract::{Path, State};
use axum::Json;
use callrelay_core::domain::{CallEndSignal, CallId, Disposition};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::HttpError;
use crate::state::AppState;

const CALL_END_TOPIC: &str = "call_end";

#[derive(Debug, Deserialize)]
pub struct EndCallBody {
    #[serde(rename = "callId")]
    pub call_id: String,
}

pub async fn end_call(
    State(state): State<AppState>,
    Json(body): Json<EndCallBody>,
) -> Result<Json<Disposition>, HttpError> {
    let call_id = CallId::new(body.call_id);
    let disposition = state.disposition_service.end_call(&call_id).await?;
    publish_call_end(&state.bus, &call_id).await;
    Ok(Json(disposition))
}

/// Calls ended through this HTTP path (rather than the Ingest Gateway's
/// `stop`/idle-watchdog path) still need to tell the ASR Worker's dispatcher
/// to finish the call's per-call task.
async fn publish_call_end(bus: &std::sync::Arc<dyn callrelay_core::ports::BusPort>, call_id: &CallId) {
    let signal = CallEndSignal {
        call_id: call_id.clone(),
    };
    match serde_json::to_vec(&signal) {
        Ok(bytes) => {
            if let Err(err) = bus.publish(CALL_END_TOPIC, bytes).await {
                warn!(error = %err, %call_id, "call_end publish failed");
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize call_end signal"),
    }
}

#[derive(Debug, Serialize)]
pub struct DisposeResponse {
    pub ok: bool,
}

pub async fn dispose_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<DisposeResponse>, HttpError> {
    let call_id = CallId::new(call_id);

    state.repos.intents.delete_for_call(&call_id).await?;
    state.intent_inflight.lock().unwrap().remove(&call_id);

    Ok(Json(DisposeResponse { ok: true }))
}
