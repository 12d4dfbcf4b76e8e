//! `GET /v1/ingest` — WebSocket upgrade for the audio data plane.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use callrelay_core::ports::BusPort;

use crate::connection::{handle_connection, GatewayConfig, HealthFlag};
use crate::jwt::JwtVerifier;

#[derive(Clone)]
pub struct GatewayState {
    pub bus: Arc<dyn BusPort>,
    pub config: Arc<GatewayConfig>,
    pub health: HealthFlag,
    pub jwt_verifier: Option<Arc<JwtVerifier>>,
}

pub async fn ingest_ws(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| {
        handle_connection(
            socket,
            state.bus,
            state.config,
            state.health,
            state.jwt_verifier,
            bearer,
        )
    })
}

pub fn router(state: GatewayState) -> axum::Router {
    axum::Router::new()
        .route("/v1/ingest", axum::routing::get(ingest_ws))
        .route(
            "/api/health",
            axum::routing::get(|| async {
                axum::Json(serde_json::json!({"status": "ok"}))
            }),
        )
        .with_state(state)
}
