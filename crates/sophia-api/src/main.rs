// Sophia API server
// Decision: In-memory storage when no database URL is configured (local development)
// Decision: Expired sessions are swept hourly in addition to the on-lookup delete

use anyhow::{Context, Result};
use sophia_api::{build_app, AppState, ServerConfig};
use sophia_core::telemetry::{init_telemetry, TelemetryConfig};
use sophia_storage::StorageBackend;
use std::time::Duration;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    ServerConfig::load_dotenv();

    let mut telemetry_config = TelemetryConfig::from_env();
    if telemetry_config.service_name == "sophia" {
        telemetry_config.service_name = "sophia-api".to_string();
    }
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter = Some("sophia_api=debug,tower_http=debug".to_string());
    }
    telemetry_config.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
    init_telemetry(telemetry_config);

    tracing::info!("sophia-api starting...");

    let config = ServerConfig::from_env();
    let secret = config
        .resolve_secret()
        .context("Failed to resolve auth secret")?;

    let storage = match &config.database_url {
        Some(url) => {
            let storage = StorageBackend::postgres(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            storage
        }
        None => {
            tracing::warn!("No DATABASE_URL or HYPERDRIVE set, using in-memory storage");
            StorageBackend::in_memory()
        }
    };

    tracing::info!(
        storage = storage.kind(),
        base_url = %config.base_url,
        origins = config.allowed_origins.len(),
        google = config.google.is_some(),
        debug_routes = config.debug_routes,
        "Configuration loaded"
    );

    let sweep_storage = storage.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match sweep_storage.delete_expired_sessions().await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, "Deleted expired sessions"),
                Err(e) => tracing::error!("Failed to delete expired sessions: {}", e),
            }
        }
    });

    let addr = config.bind_address();
    let app = build_app(AppState::new(storage, config, &secret));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
