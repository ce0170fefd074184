//! Integration tests for the relay's HTTP surface.
//!
//! Covers pre-stream error handling (missing target, upstream non-2xx,
//! unreachable upstream), CORS behavior, and the health endpoint.

use std::sync::Arc;

use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use inkrelay::config::Config;
use inkrelay::relay::{create_router, AppState};

/// Build a relay test app, optionally with a custom origin allow-list.
fn test_app_with_origins(origins: Option<Vec<String>>) -> axum::Router {
    let mut config = Config::default();
    if let Some(origins) = origins {
        config.cors.allowed_origins = origins;
    }
    let state = AppState {
        http_client: reqwest::Client::new(),
        config: Arc::new(config),
    };
    create_router(state)
}

fn test_app() -> axum::Router {
    test_app_with_origins(None)
}

/// Parse the response body as JSON and return (status_code, json_value).
async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, json)
}

fn proxy_request(payload: serde_json::Value) -> Request<Body> {
    Request::post("/api/stream-proxy")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

// ============================================================================
// Pre-stream errors
// ============================================================================

#[tokio::test]
async fn missing_target_url_is_client_error() {
    let app = test_app();

    let payload = json!({"targetUrl": "", "isOllama": false, "body": {}});
    let response = app.oneshot(proxy_request(payload)).await.unwrap();
    let (status, body) = parse_body(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Missing target"),
        "error should name the missing field: {}",
        body
    );
}

#[tokio::test]
async fn missing_target_url_makes_no_upstream_call() {
    // A catch-all mock that must never be hit.
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let app = test_app();
    let payload = json!({"targetUrl": "", "isOllama": false, "body": {}});
    let response = app.oneshot(proxy_request(payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // MockServer verifies expect(0) on drop.
}

#[tokio::test]
async fn upstream_error_status_and_body_surfaced() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = test_app();
    let payload = json!({"targetUrl": upstream.uri(), "isOllama": false, "body": {}});
    let response = app.oneshot(proxy_request(payload)).await.unwrap();

    // Upstream's own status is preserved, with a single JSON error body.
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let (status, body) = parse_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(content_type.starts_with("application/json"));

    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("500"), "message should carry the status: {}", message);
    assert!(message.contains("boom"), "message should carry the body: {}", message);
}

#[tokio::test]
async fn upstream_auth_failure_keeps_status() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&upstream)
        .await;

    let app = test_app();
    let payload = json!({"targetUrl": upstream.uri(), "isOllama": false, "body": {}});
    let response = app.oneshot(proxy_request(payload)).await.unwrap();
    let (status, body) = parse_body(response).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid api key"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let app = test_app();

    // Port 1 refuses connections on any sane machine.
    let payload = json!({"targetUrl": "http://127.0.0.1:1", "isOllama": false, "body": {}});
    let response = app.oneshot(proxy_request(payload)).await.unwrap();
    let (status, body) = parse_body(response).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn invalid_json_body_rejected() {
    let app = test_app();

    let request = Request::post("/api/stream-proxy")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

// ============================================================================
// CORS
// ============================================================================

#[tokio::test]
async fn preflight_echoes_allowed_origin() {
    let app = test_app();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/stream-proxy")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type, authorization")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    let methods = response
        .headers()
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(methods.contains("POST"));
    assert!(methods.contains("DELETE"));
}

#[tokio::test]
async fn preflight_rejects_unlisted_origin() {
    let app = test_app_with_origins(Some(vec!["https://writer.example.com".to_string()]));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/stream-proxy")
        .header("origin", "https://evil.example.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn proxy_response_carries_cors_header() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
        )
        .mount(&upstream)
        .await;

    let app = test_app();
    let request = Request::post("/api/stream-proxy")
        .header("content-type", "application/json")
        .header("origin", "http://localhost:3000")
        .body(Body::from(
            json!({"targetUrl": upstream.uri(), "isOllama": false, "body": {}}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "inkrelay");
}
