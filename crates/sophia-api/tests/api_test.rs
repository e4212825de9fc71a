// Service endpoints, debug routes and CORS through the full router

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use sophia_api::ServerConfig;

const SPA_ORIGIN: &str = "https://app.jyoung2k.org";

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::new();

    let root = app.get("/", None).await;
    assert_eq!(root.status, StatusCode::OK);
    let info = root.json();
    assert_eq!(info["name"], "sophia-api");
    assert_eq!(info["endpoints"]["trpc"], "/api/trpc");
    assert_eq!(info["endpoints"]["auth"], "/api/auth");
    assert_eq!(info["documentation"]["auth"], "https://www.better-auth.com");

    let health = app.get("/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    let body = health.json();
    assert_eq!(body["status"], "healthy");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert!(timestamp.ends_with('Z'));

    let cors = app.get("/api/test-cors", None).await;
    assert_eq!(cors.json()["message"], "CORS is working!");
}

#[tokio::test]
async fn test_debug_routes() {
    let config = ServerConfig {
        cookie_domain: ".example.test".to_string(),
        ..ServerConfig::default()
    };
    let app = TestApp::with_config(config);

    let session = app.get("/api/test-session", None).await;
    assert_eq!(session.status, StatusCode::OK);
    assert_eq!(session.text(), "Cookie test");
    let cookies = session.set_cookies();
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("test-cookie=test-value;"));
    assert!(cookies[0].contains("Domain=.example.test"));
    assert!(cookies[0].contains("SameSite=None"));

    let callback = app.get("/test-oauth-callback", None).await;
    assert_eq!(callback.status, StatusCode::FOUND);
    assert_eq!(
        callback.location().as_deref(),
        Some("http://localhost:8787/api/auth/callback/google?code=test_code&state=test_state")
    );
}

#[tokio::test]
async fn test_debug_routes_can_be_disabled() {
    let config = ServerConfig {
        debug_routes: false,
        ..ServerConfig::default()
    };
    let app = TestApp::with_config(config);

    assert_eq!(
        app.get("/api/test-session", None).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/test-oauth-callback", None).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/get-session")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::new();

    let allowed = app.send(preflight(SPA_ORIGIN)).await;
    assert_eq!(allowed.status, StatusCode::NO_CONTENT);
    assert_eq!(allowed.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], SPA_ORIGIN);
    assert_eq!(allowed.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let denied = app.send(preflight("https://evil.example.com")).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert!(denied
        .headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_cors_headers_on_api_responses() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/api/auth/get-session")
                .header(header::ORIGIN, SPA_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], SPA_ORIGIN);
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let configured = TestApp::with_config(ServerConfig {
        allowed_origins: vec!["https://staging.example.test".to_string()],
        ..ServerConfig::default()
    });
    let response = configured
        .send(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, SPA_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
