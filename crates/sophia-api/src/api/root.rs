// Service info, health and CORS probe endpoints

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub trpc: &'static str,
    pub auth: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Documentation {
    pub trpc: &'static str,
    pub auth: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
    pub documentation: Documentation,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// RFC 3339 with milliseconds
    pub timestamp: String,
}

/// GET / - API information
pub async fn index() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            trpc: "/api/trpc",
            auth: "/api/auth",
            health: "/health",
        },
        documentation: Documentation {
            trpc: "https://trpc.io",
            auth: "https://www.better-auth.com",
        },
    })
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// GET /api/test-cors
pub async fn test_cors() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "CORS is working!" }))
}
