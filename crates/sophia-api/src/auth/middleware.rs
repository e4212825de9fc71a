// Auth errors and request logging for /api/auth/*
// Decision: Errors serialize as {"error": "..."} with the status carried alongside

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

use super::cookie_rewrite::rewrite_set_cookie_headers;

/// Authentication error
#[derive(Debug, Clone, Serialize)]
pub struct AuthError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl AuthError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Log the underlying failure and hide it from the client
    pub fn internal(err: impl Display) -> Self {
        tracing::error!("Auth request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Logs every auth request and rewrites OAuth callback cookies for the
/// cross-site SPA (see `cookie_rewrite`). Cookie values are never logged.
pub async fn auth_request_middleware(
    State(cookie_domain): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let has_set_cookie = response.headers().contains_key(header::SET_COOKIE);
    tracing::debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        has_set_cookie,
        "Auth request"
    );

    if has_set_cookie && path.contains("/callback/") {
        let rewritten = rewrite_set_cookie_headers(response.headers_mut(), &cookie_domain);
        tracing::info!(
            %path,
            cookies = rewritten,
            domain = %cookie_domain,
            "Rewrote OAuth callback cookies"
        );
    }

    response
}
