// Service endpoints outside /api/auth and /api/trpc

pub mod debug;
pub mod root;

use axum::{routing::get, Router};

use crate::context::AppState;

/// Create service routes; debug routes only when enabled
pub fn routes(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root::index))
        .route("/health", get(root::health))
        .route("/api/test-cors", get(root::test_cors));

    if state.config.debug_routes {
        router = router
            .route("/api/test-session", get(debug::test_session))
            .route("/test-oauth-callback", get(debug::test_oauth_callback));
    }

    router.with_state(state)
}
