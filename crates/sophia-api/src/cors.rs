// CORS middleware
// Decision: Custom middleware instead of tower-http CorsLayer; disallowed preflights
// must be answered with 403 and allowed ones with 204, which CorsLayer does not do
//
// Non-preflight requests from unknown origins pass through without CORS headers,
// so the browser (not the server) blocks the response.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;

pub const ALLOWED_METHODS: &str = "GET, HEAD, PUT, PATCH, POST, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, x-requested-with, x-client-version, x-client-name, x-client-platform, x-session-id, x-request-id";
pub const EXPOSED_HEADERS: &str = "Content-Length, Content-Type, X-Request-Id, X-Response-Time";
pub const MAX_AGE_SECONDS: u32 = 86400;

/// Exact-match origin allow-list
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: HashSet<String>,
}

impl CorsPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    /// The request's Origin, if present and allowed
    fn allowed_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        headers
            .get(header::ORIGIN)
            .filter(|origin| {
                origin
                    .to_str()
                    .map(|o| self.is_allowed(o))
                    .unwrap_or(false)
            })
            .cloned()
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = policy.allowed_origin(request.headers());

    if request.method() == Method::OPTIONS {
        let Some(origin) = origin else {
            tracing::debug!(
                origin = ?request.headers().get(header::ORIGIN),
                path = %request.uri().path(),
                "Rejected CORS preflight"
            );
            return StatusCode::FORBIDDEN.into_response();
        };

        let wants_headers = request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_HEADERS);
        return preflight_response(origin, wants_headers);
    }

    let mut response = next.run(request).await;
    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    response
}

fn preflight_response(origin: HeaderValue, wants_headers: bool) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();

    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    if wants_headers {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(MAX_AGE_SECONDS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let policy = Arc::new(CorsPolicy::new(["http://localhost:5173"]));
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(policy, cors_middleware))
    }

    fn preflight(origin: Option<&str>, request_headers: bool) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(Method::OPTIONS).uri("/ping");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        if request_headers {
            builder = builder.header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type");
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_policy_exact_match() {
        let policy = CorsPolicy::new(["https://app.example.com"]);
        assert!(policy.is_allowed("https://app.example.com"));
        assert!(!policy.is_allowed("https://app.example.com/"));
        assert!(!policy.is_allowed("https://evil.example.com"));
    }

    #[tokio::test]
    async fn test_allowed_preflight() {
        let response = app()
            .oneshot(preflight(Some("http://localhost:5173"), true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn test_preflight_without_request_headers_omits_allow_headers() {
        let response = app()
            .oneshot(preflight(Some("http://localhost:5173"), false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .is_none());
    }

    #[tokio::test]
    async fn test_disallowed_or_missing_origin_preflight_is_forbidden() {
        let response = app()
            .oneshot(preflight(Some("https://evil.example.com"), true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app().oneshot(preflight(None, false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_simple_request_headers() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(response.headers()[header::VARY], "Origin");

        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
