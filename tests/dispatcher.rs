//! Dispatcher-level behavior: service routes, fallbacks and headers.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use common::{body_bytes, body_json, get, send, test_app, test_state};
use efficepart::{build_standalone, ToolKind};

#[tokio::test]
async fn test_health() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_dashboard_lists_tools() {
    let (app, _state, _dir) = test_app().await;
    let body = body_json(send(&app, get("/")).await).await;
    let tools = body.as_array().unwrap();
    assert_eq!(tools.len(), 9);
    assert!(tools.iter().any(|t| t["url"] == "/gigafile"));
    assert!(tools.iter().all(|t| t["url"] != "/"));

    let blueprints = body_json(send(&app, get("/api/blueprints")).await).await;
    assert_eq!(blueprints, body);
}

#[tokio::test]
async fn test_not_found_json_for_api_paths() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, get("/api/nothing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn test_not_found_text_for_pages() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, get("/no-such-page")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("404"));
}

#[tokio::test]
async fn test_not_found_json_when_accepted() {
    let (app, _state, _dir) = test_app().await;
    let request = Request::builder()
        .uri("/no-such-page")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not Found");
}

#[tokio::test]
async fn test_security_headers() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, get("/health")).await;
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert!(headers.contains_key("content-security-policy"));
    assert!(!headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_generate_redirects_to_shift() {
    let (app, _state, _dir) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/shift/generate");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_howto_index() {
    let (app, _state, _dir) = test_app().await;
    let body = body_json(send(&app, get("/howto")).await).await;
    assert_eq!(body["pages"].as_array().unwrap().len(), 8);

    let response = send(&app, get("/howto/api/howto/content/unknown")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_standalone_serves_tool_under_prefix() {
    let (state, _dir) = test_state(std::time::Duration::from_secs(60)).await;
    let app = build_standalone(ToolKind::Transfer, state);

    let response = send(&app, get("/transfer/files")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["files"], serde_json::json!([]));

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/pdf/info")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
