// Telemetry initialization
//
// Console logging through tracing-subscriber, filtered by RUST_LOG/LOG_LEVEL.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name reported in the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: Option<String>,
    /// Environment (e.g., "development", "production")
    pub environment: Option<String>,
    /// Whether to include the event target in log lines
    pub with_target: bool,
    /// Log filter (e.g., "info", "debug", "sophia_api=debug")
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "sophia".to_string(),
            service_version: None,
            environment: None,
            with_target: true,
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SERVICE_NAME`: Service name (default: "sophia")
    /// - `NODE_ENV` or `APP_ENV`: Deployment environment
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "sophia".to_string()),
            service_version: None,
            environment: std::env::var("APP_ENV")
                .or_else(|_| std::env::var("NODE_ENV"))
                .ok(),
            with_target: true,
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored (tests share a process).
pub fn init_telemetry(config: TelemetryConfig) {
    let filter = build_filter(config.log_filter.as_deref());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_filter(filter);

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::info!(
        service = %config.service_name,
        version = config.service_version.as_deref().unwrap_or("unknown"),
        environment = config.environment.as_deref().unwrap_or("development"),
        "Telemetry initialized"
    );
}

fn build_filter(log_filter: Option<&str>) -> EnvFilter {
    log_filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "sophia");
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_filter_defaults_to_info() {
        assert_eq!(build_filter(None).to_string(), "info");
        assert_eq!(build_filter(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_telemetry(TelemetryConfig::default());
        init_telemetry(TelemetryConfig::default());
    }
}
