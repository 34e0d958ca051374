//! Integration tests for the demo emitter.
//!
//! These exercise the full router, middleware included, and pin down the
//! externally observable behavior of every route.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use emitter::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;

fn test_app() -> Router {
    create_router(AppState::new("integration".to_string()))
}

/// Helper to make a GET request.
async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

#[tokio::test]
async fn test_root_status_payload() {
    let (status, body) = get(test_app(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], "integration");
    assert!(body["timestamp"].is_string());
    assert!(body["note"]
        .as_str()
        .unwrap()
        .contains("collector sidecar"));
}

#[tokio::test]
async fn test_health_is_200_without_a_collector() {
    // No telemetry SDK is installed and no collector is running; liveness
    // must not care.
    let (status, body) = get(test_app(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime"].is_number());
}

#[tokio::test(start_paused = true)]
async fn test_users_count_is_always_three() {
    let app = test_app();

    for _ in 0..5 {
        let (status, body) = get(app.clone(), "/api/users").await;
        assert_eq!(status, StatusCode::OK);

        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(body["count"], 3);
    }
}

#[tokio::test]
async fn test_error_route_contract() {
    let (status, body) = get(test_app(), "/api/error").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
    assert!(body["message"].as_str().unwrap().contains("simulated"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_users_latency_stays_within_documented_bounds() {
    // With the clock paused, the only time that elapses is the artificial
    // sleep itself, so the measured wall time is exactly the chosen delay.
    let started = tokio::time::Instant::now();
    let (status, _body) = get(test_app(), "/api/users").await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert!(elapsed >= std::time::Duration::from_millis(50));
    assert!(elapsed <= std::time::Duration::from_millis(250));
}
