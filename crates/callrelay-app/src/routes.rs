use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .route(
            "/api/transcripts/receive",
            post(handlers::ingest::receive_transcript),
        )
        .route(
            "/api/calls/ingest-transcript",
            post(handlers::ingest::ingest_transcript),
        )
        .route(
            "/api/transcripts/latest",
            get(handlers::transcripts::latest_transcript),
        )
        .route("/api/calls/end", post(handlers::calls::end_call))
        .route(
            "/api/calls/:call_id/dispose",
            post(handlers::calls::dispose_call),
        )
        .route("/api/events/stream", get(handlers::events::stream))
        .with_state(state)
}
