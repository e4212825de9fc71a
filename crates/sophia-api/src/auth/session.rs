// Session tokens and the signed session cookie
// Decision: Opaque random tokens stored in the session table, never JWTs
// Decision: Cookie value is "<token>.<base64 HMAC-SHA256(secret, token)>"
// Decision: Bearer tokens are accepted signed or raw for non-browser clients

use anyhow::Result;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;
use sophia_core::{Session, SessionWithUser, User};
use sophia_storage::{CreateSessionRow, StorageBackend};
use uuid::Uuid;

use super::oauth::GoogleOAuthService;
use crate::config::ServerConfig;

pub const SESSION_COOKIE_NAME: &str = "better-auth.session_token";
const TOKEN_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Client details recorded on new sessions
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let ip_address = header_str("cf-connecting-ip")
            .or_else(|| {
                header_str("x-forwarded-for")
                    .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            })
            .or_else(|| header_str("x-real-ip"));

        Self {
            ip_address,
            user_agent: header_str(header::USER_AGENT.as_str()),
        }
    }
}

/// Session resolved from a request
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub data: SessionWithUser,
    /// Expiry was pushed forward during resolution; the cookie should be re-issued
    pub refreshed: bool,
}

/// Session and cookie handling shared by every route
pub struct AuthService {
    secret: Vec<u8>,
    secure_cookies: bool,
    expires_in: Duration,
    update_age: Duration,
    google: Option<GoogleOAuthService>,
}

impl AuthService {
    pub fn new(secret: &str, config: &ServerConfig) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            secure_cookies: config.secure_cookies(),
            expires_in: Duration::days(7),
            update_age: Duration::days(1),
            google: config.google.as_ref().map(GoogleOAuthService::new),
        }
    }

    pub fn google(&self) -> Option<&GoogleOAuthService> {
        self.google.as_ref()
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn generate_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }

    /// `<token>.<signature>`
    pub fn sign(&self, token: &str) -> String {
        let mut mac = self.mac();
        mac.update(token.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        format!("{}.{}", token, signature)
    }

    /// Returns the token when the signature matches
    pub fn verify_signed(&self, value: &str) -> Option<String> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = BASE64.decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(token.to_string())
    }

    /// Session token carried by the request (Bearer header first, then cookie)
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(bearer) = bearer {
            return Some(
                self.verify_signed(bearer)
                    .unwrap_or_else(|| bearer.to_string()),
            );
        }

        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(SESSION_COOKIE_NAME)?;
        let token = self.verify_signed(cookie.value());
        if token.is_none() {
            tracing::debug!("Ignoring session cookie with invalid signature");
        }
        token
    }

    /// Cookie for a new or refreshed session; `persistent: false` omits Max-Age
    pub fn session_cookie(&self, token: &str, persistent: bool) -> Cookie<'static> {
        let mut builder = Cookie::build((SESSION_COOKIE_NAME, self.sign(token)))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax);
        if persistent {
            builder = builder.max_age(time::Duration::seconds(self.expires_in.num_seconds()));
        }
        builder.build()
    }

    /// Cookie used with `CookieJar::remove` to clear the session
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE_NAME).path("/").build()
    }

    /// Create a session row for a signed-in user
    pub async fn create_session(
        &self,
        storage: &StorageBackend,
        user_id: Uuid,
        meta: &ClientMeta,
        lifetime: Option<Duration>,
    ) -> Result<Session> {
        let row = storage
            .create_session(CreateSessionRow {
                token: Self::generate_token(),
                user_id,
                expires_at: Utc::now() + lifetime.unwrap_or(self.expires_in),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
            })
            .await?;

        tracing::debug!(user_id = %user_id, session_id = %row.id, "Session created");
        Ok(row.into())
    }

    /// Whether the session was issued for the full lifetime. Sessions created
    /// with `rememberMe: false` are never extended and keep a browser-session cookie.
    pub fn is_remembered(&self, session: &Session) -> bool {
        session.expires_at - session.created_at >= self.expires_in - self.update_age
    }

    /// Resolve the caller's session. Expired sessions are deleted; remembered
    /// sessions not touched within the update age get a fresh expiry.
    pub async fn resolve_session(
        &self,
        storage: &StorageBackend,
        headers: &HeaderMap,
    ) -> Result<Option<ResolvedSession>> {
        let Some(token) = self.token_from_headers(headers) else {
            return Ok(None);
        };
        let Some(row) = storage.get_session_by_token(&token).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut session: Session = row.into();
        if session.is_expired_at(now) {
            storage.delete_session_by_token(&token).await?;
            return Ok(None);
        }

        let Some(user) = storage.get_user(session.user_id).await? else {
            return Ok(None);
        };

        let mut refreshed = false;
        if self.is_remembered(&session) && session.updated_at + self.update_age <= now {
            if let Some(row) = storage
                .touch_session(session.id, now + self.expires_in)
                .await?
            {
                session = row.into();
                refreshed = true;
            }
        }

        Ok(Some(ResolvedSession {
            data: SessionWithUser {
                session,
                user: User::from(user),
            },
            refreshed,
        }))
    }

    /// Push a remembered session's expiry forward. Other sessions come back
    /// as stored.
    pub async fn extend_session(
        &self,
        storage: &StorageBackend,
        session: &Session,
    ) -> Result<Option<Session>> {
        if !self.is_remembered(session) {
            let row = storage.get_session_by_token(&session.token).await?;
            return Ok(row.map(Session::from));
        }
        let row = storage
            .touch_session(session.id, Utc::now() + self.expires_in)
            .await?;
        Ok(row.map(Session::from))
    }
}
