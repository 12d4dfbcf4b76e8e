use axum::body::Body;
use axum::http::{Request, StatusCode};
use callrelay_app::bootstrap::{bootstrap, ServerConfig};
use callrelay_app::routes::create_router;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn test_app() -> axum::Router {
    let config = ServerConfig::builder().database_url("sqlite::memory:").build();
    let ctx = bootstrap(&config).await.expect("bootstrap should succeed");
    create_router(ctx)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = test_app().await;

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

#[tokio::test]
async fn ingest_transcript_assigns_sequential_seq() {
    let app = test_app().await;

    let body = serde_json::json!({
        "callId": "call-1",
        "text": "Agent: how can I help?",
        "ts": "2026-01-01T00:00:00Z",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/calls/ingest-transcript")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["seq"], 0);
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn receive_transcript_rejects_empty_text() {
    let app = test_app().await;

    let body = serde_json::json!({
        "callId": "call-1",
        "transcript": "   ",
        "asr_service": "p1",
        "timestamp": "2026-01-01T00:00:00Z",
        "isFinal": true,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/transcripts/receive")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
