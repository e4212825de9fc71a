// OAuth client for social sign-in
// Decision: Manual OAuth2 code flow over reqwest (Google only)
// Decision: Provider tokens are returned to the caller and stored on the identity row

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use url::Url;

use crate::config::GoogleProviderConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_SCOPES: &str = "openid email profile";

/// Supported social providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            _ => None,
        }
    }
}

/// Profile returned by the provider
#[derive(Debug, Clone)]
pub struct OAuthUserInfo {
    /// Provider subject identifier
    pub account_id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub email_verified: bool,
}

/// Tokens issued by the provider for the signed-in user
#[derive(Debug, Clone, Default)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Result of a successful code exchange
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub user: OAuthUserInfo,
    pub tokens: OAuthTokens,
}

/// Google OAuth service
#[derive(Debug, Clone)]
pub struct GoogleOAuthService {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
    http: reqwest::Client,
}

impl GoogleOAuthService {
    pub fn new(config: &GoogleProviderConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_url: config.token_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Authorization URL the browser is sent to
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_SCOPES),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "select_account"),
            ],
        )
        .context("Failed to build Google authorization URL")?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens and the user's profile
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthProfile> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Failed to exchange code")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Google token endpoint returned {}: {}", status, body);
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let user_info: GoogleUserInfo = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("Failed to fetch user info")?
            .error_for_status()
            .context("Google userinfo request rejected")?
            .json()
            .await
            .context("Failed to parse user info")?;

        let name = user_info
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user_info.email.clone());

        Ok(OAuthProfile {
            user: OAuthUserInfo {
                account_id: user_info.sub,
                email: user_info.email,
                name,
                image: user_info.picture,
                email_verified: user_info.email_verified.unwrap_or(false),
            },
            tokens: OAuthTokens {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                id_token: token.id_token,
                access_token_expires_at: token
                    .expires_in
                    .map(|secs| Utc::now() + Duration::seconds(secs)),
                scope: token.scope,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
    email_verified: Option<bool>,
}
