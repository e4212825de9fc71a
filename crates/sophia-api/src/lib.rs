// Sophia API library
// Decision: Shared library for binaries (API server, OpenAPI export) and router-level tests

// Misc service endpoints
pub mod api;

// Authentication module (Better Auth-compatible)
pub mod auth;

pub mod config;
pub mod context;
pub mod cors;

// OpenAPI spec generation
pub mod openapi;

// tRPC adapter and procedures
pub mod trpc;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use context::AppState;

/// Build the complete application router
pub fn build_app(state: AppState) -> Router {
    let cors_policy = Arc::new(cors::CorsPolicy::new(
        state.config.allowed_origins.iter().cloned(),
    ));

    Router::new()
        .merge(api::routes(state.clone()))
        .merge(auth::routes(state.clone()))
        .merge(trpc::routes(state))
        .layer(axum::middleware::from_fn_with_state(
            cors_policy,
            cors::cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
