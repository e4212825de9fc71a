// Server configuration loaded from environment variables
// Decision: One configuration path for every deployment (local, container, edge proxy)
// Decision: Hard-coded production domains from the first deployment become defaults

use anyhow::{bail, Result};
use rand::Rng;

/// Origins allowed when ALLOWED_ORIGINS is not set
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5180",
    "http://127.0.0.1:5180",
    "http://localhost:8787",
    "http://127.0.0.1:8787",
    "http://localhost:8788",
    "http://127.0.0.1:8788",
    "http://localhost:4321",
    "https://app.jyoung2k.org",
    "https://www.jyoung2k.org",
    "https://fcef7590.sophia-app.pages.dev",
    "https://main.sophia-app.pages.dev",
    "https://a830f2d1.sophia-app.pages.dev",
    "https://3b9002fa.sophia-app.pages.dev",
    "https://68ffae69.sophia-app.pages.dev",
    "https://e248b0b3.sophia-app.pages.dev",
    "https://789d2480.sophia-app.pages.dev",
    "https://e0d3ede0.sophia-app.pages.dev",
    "https://be8673a7.sophia-app.pages.dev",
];

pub const DEFAULT_BASE_URL: &str = "http://localhost:8787";
pub const DEFAULT_COOKIE_DOMAIN: &str = ".jyoung2k.org";

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Google OAuth client configuration
#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleProviderConfig {
    /// Client against Google's public endpoints
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Postgres connection string (HYPERDRIVE wins over DATABASE_URL)
    pub database_url: Option<String>,
    /// Secret for signing session cookies
    pub auth_secret: Option<String>,
    /// Public base URL of this API, used for OAuth redirect URIs
    pub base_url: String,
    pub allowed_origins: Vec<String>,
    /// Domain forced onto OAuth callback cookies
    pub cookie_domain: String,
    pub google: Option<GoogleProviderConfig>,
    /// Serve /api/test-session and /test-oauth-callback
    pub debug_routes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            database_url: None,
            auth_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cookie_domain: DEFAULT_COOKIE_DOMAIN.to_string(),
            google: None,
            debug_routes: true,
        }
    }
}

impl ServerConfig {
    /// Load `.env.local` then `.env` into the process environment (existing vars win)
    pub fn load_dotenv() {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let base_url = get("BETTER_AUTH_URL")
            .or_else(|| get("API_URL"))
            .or_else(|| get("VITE_API_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => {
                let mut google = GoogleProviderConfig::new(
                    client_id,
                    client_secret,
                    format!("{}/api/auth/callback/google", base_url),
                );
                if let Some(url) = get("GOOGLE_TOKEN_URL") {
                    google.token_url = url;
                }
                if let Some(url) = get("GOOGLE_USERINFO_URL") {
                    google.userinfo_url = url;
                }
                Some(google)
            }
            _ => None,
        };

        let debug_routes = get("DEBUG_ROUTES")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(defaults.debug_routes);

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: get("HYPERDRIVE").or_else(|| get("DATABASE_URL")),
            auth_secret: get("BETTER_AUTH_SECRET"),
            base_url,
            allowed_origins,
            cookie_domain: get("COOKIE_DOMAIN").unwrap_or(defaults.cookie_domain),
            google,
            debug_routes,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cookies carry `Secure` when the public URL is https
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Signing secret for session cookies.
    ///
    /// Without BETTER_AUTH_SECRET a random secret is generated in dev mode
    /// (sessions do not survive a restart); with a database configured this is an error.
    pub fn resolve_secret(&self) -> Result<String> {
        if let Some(secret) = &self.auth_secret {
            return Ok(secret.clone());
        }
        if self.database_url.is_some() {
            bail!("BETTER_AUTH_SECRET must be set when a database is configured");
        }

        tracing::warn!("BETTER_AUTH_SECRET not set, using a random secret for this process");
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Ok(hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:8787");
        assert_eq!(config.base_url, "http://localhost:8787");
        assert_eq!(config.cookie_domain, ".jyoung2k.org");
        assert!(config.database_url.is_none());
        assert!(config.google.is_none());
        assert!(config.debug_routes);
        assert!(!config.secure_cookies());
        assert!(config
            .allowed_origins
            .contains(&"http://localhost:5173".to_string()));
    }

    #[test]
    fn test_hyperdrive_wins_over_database_url() {
        let config = config_from(&[
            ("HYPERDRIVE", "postgres://hyperdrive/db"),
            ("DATABASE_URL", "postgres://direct/db"),
        ]);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://hyperdrive/db")
        );

        let config = config_from(&[("HYPERDRIVE", ""), ("DATABASE_URL", "postgres://direct/db")]);
        assert_eq!(config.database_url.as_deref(), Some("postgres://direct/db"));
    }

    #[test]
    fn test_allowed_origins_override() {
        let config = config_from(&[(
            "ALLOWED_ORIGINS",
            "https://a.example.com, https://b.example.com,,",
        )]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn test_google_requires_both_credentials() {
        let config = config_from(&[("GOOGLE_CLIENT_ID", "id")]);
        assert!(config.google.is_none());

        let config = config_from(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("BETTER_AUTH_URL", "https://api.example.com/"),
        ]);
        let google = config.google.as_ref().unwrap();
        assert_eq!(
            google.redirect_uri,
            "https://api.example.com/api/auth/callback/google"
        );
        assert_eq!(google.token_url, GOOGLE_TOKEN_URL);
        assert!(config.secure_cookies());

        let config = config_from(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_TOKEN_URL", "http://127.0.0.1:9999/token"),
            ("GOOGLE_USERINFO_URL", "http://127.0.0.1:9999/userinfo"),
        ]);
        let google = config.google.unwrap();
        assert_eq!(google.token_url, "http://127.0.0.1:9999/token");
        assert_eq!(google.userinfo_url, "http://127.0.0.1:9999/userinfo");
    }

    #[test]
    fn test_debug_routes_toggle() {
        assert!(!config_from(&[("DEBUG_ROUTES", "false")]).debug_routes);
        assert!(!config_from(&[("DEBUG_ROUTES", "0")]).debug_routes);
        assert!(config_from(&[("DEBUG_ROUTES", "true")]).debug_routes);
    }

    #[test]
    fn test_secret_resolution() {
        let dev = ServerConfig::default();
        assert_eq!(dev.resolve_secret().unwrap().len(), 64);

        let prod = ServerConfig {
            database_url: Some("postgres://localhost/sophia".to_string()),
            ..Default::default()
        };
        assert!(prod.resolve_secret().is_err());

        let configured = ServerConfig {
            auth_secret: Some("s3cret".to_string()),
            ..prod
        };
        assert_eq!(configured.resolve_secret().unwrap(), "s3cret");
    }
}
