use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use callrelay_bus::InMemoryBus;
use callrelay_gateway::{router, GatewayConfig, GatewayState, HealthFlag};
use http_body_util::BodyExt;
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok() {
    let state = GatewayState {
        bus: Arc::new(InMemoryBus::new()),
        config: Arc::new(GatewayConfig::default()),
        health: HealthFlag::default(),
        jwt_verifier: None,
    };
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
