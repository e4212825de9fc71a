// Debug endpoints for cookie and OAuth troubleshooting (DEBUG_ROUTES)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::context::AppState;

/// Set-Cookie value issued by /api/test-session
pub fn test_cookie(cookie_domain: &str) -> String {
    format!(
        "test-cookie=test-value; Domain={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=3600",
        cookie_domain
    )
}

/// GET /api/test-session - Issue a cross-site test cookie
pub async fn test_session(State(state): State<AppState>) -> Response {
    let cookie = test_cookie(&state.config.cookie_domain);
    tracing::debug!(domain = %state.config.cookie_domain, "Issuing test cookie");
    ([(header::SET_COOKIE, cookie)], "Cookie test").into_response()
}

/// GET /test-oauth-callback - Exercise the Google callback with fake parameters
pub async fn test_oauth_callback(State(state): State<AppState>) -> Response {
    let location = format!(
        "{}/api/auth/callback/google?code=test_code&state=test_state",
        state.config.base_url
    );
    tracing::info!(%location, "Redirecting to OAuth callback with test parameters");
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
