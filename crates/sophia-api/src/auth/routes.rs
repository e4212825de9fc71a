// Authentication HTTP routes
// Decision: Serve the Better Auth wire surface under /api/auth/* so existing auth clients work unchanged
// Decision: Email/password credentials live on an "email" identity, not on the user row
// Decision: OAuth state is a verification row, consumed on first use

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sophia_core::{Session, SessionWithUser, User};
use sophia_storage::{
    is_conflict,
    password::{hash_password, password_length_ok, verify_password, MIN_PASSWORD_LENGTH},
    CreateIdentityRow, CreateUserRow, CreateVerificationRow, UpdateIdentityTokens, UpdateUser,
};
use std::sync::Arc;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    middleware::{auth_request_middleware, AuthError},
    oauth::{OAuthProfile, OAuthProvider},
    organization,
    session::ClientMeta,
};
use crate::context::{AppState, AuthSession, RequestContext};

/// Provider id of email/password identities
pub const EMAIL_PROVIDER_ID: &str = "email";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Generate a random state string for OAuth (32 hex characters)
fn generate_oauth_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn oauth_state_identifier(state: &str) -> String {
    format!("oauth-state:{}", state)
}

/// Lowercased email, or None when it is not plausibly an address
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return None;
    }
    Some(email)
}

/// Sign-up request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpEmailRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

/// Sign-in request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInEmailRequest {
    pub email: String,
    pub password: String,
    /// When false the cookie lives for the browser session and the session for one day
    pub remember_me: Option<bool>,
}

/// Social sign-in request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SocialSignInRequest {
    pub provider: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: Option<String>,
    #[serde(rename = "errorCallbackURL")]
    pub error_callback_url: Option<String>,
    #[serde(rename = "newUserCallbackURL")]
    pub new_user_callback_url: Option<String>,
}

/// Change-password request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    /// Sign out every other device; the caller gets a fresh session
    #[serde(default)]
    pub revoke_other_sessions: bool,
}

/// Change-password response; `token` is set when other sessions were revoked
#[derive(Debug, Serialize, ToSchema)]
pub struct ChangePasswordResponse {
    pub token: Option<String>,
    pub user: User,
}

/// Token + user, returned by sign-up and anonymous sign-in
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionTokenResponse {
    pub token: String,
    pub user: User,
}

/// Email sign-in response
#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    pub redirect: bool,
    pub token: String,
    pub url: Option<String>,
    pub user: User,
}

/// Social sign-in response: the browser should navigate to `url`
#[derive(Debug, Serialize, ToSchema)]
pub struct SocialSignInResponse {
    pub url: String,
    pub redirect: bool,
}

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

/// Stored with the OAuth state until the provider redirects back
#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateData {
    provider: String,
    callback_url: Option<String>,
    error_callback_url: Option<String>,
    new_user_callback_url: Option<String>,
}

/// Create auth routes
pub fn routes(state: AppState) -> Router {
    let cookie_domain: Arc<str> = Arc::from(state.config.cookie_domain.as_str());

    Router::new()
        .route("/api/auth/sign-up/email", post(sign_up_email))
        .route("/api/auth/sign-in/email", post(sign_in_email))
        .route("/api/auth/sign-in/anonymous", post(sign_in_anonymous))
        .route("/api/auth/sign-in/social", post(sign_in_social))
        .route("/api/auth/callback/:provider", get(oauth_callback))
        .route("/api/auth/get-session", get(get_session))
        .route("/api/auth/session", get(get_session))
        .route("/api/auth/session/refresh", post(refresh_session))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/revoke-sessions", post(revoke_sessions))
        .route("/api/auth/ok", get(ok))
        .route("/api/auth/error", get(error_page))
        .route("/api/auth/to-j-s-o-n", post(to_json))
        .route(
            "/api/auth/open-api/generate-schema",
            get(crate::openapi::generate_schema),
        )
        .merge(organization::routes())
        .layer(axum::middleware::from_fn_with_state(
            cookie_domain,
            auth_request_middleware,
        ))
        .with_state(state)
}

/// POST /api/auth/sign-up/email - Register with email and password
#[utoipa::path(
    post,
    path = "/api/auth/sign-up/email",
    request_body = SignUpEmailRequest,
    responses(
        (status = 200, description = "User created and signed in", body = SessionTokenResponse),
        (status = 400, description = "Invalid email, name or password"),
        (status = 422, description = "User already exists")
    ),
    tag = "auth"
)]
pub async fn sign_up_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<SignUpEmailRequest>,
) -> Result<(CookieJar, Json<SessionTokenResponse>), AuthError> {
    let email = normalize_email(&req.email).ok_or_else(|| AuthError::bad_request("Invalid email"))?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AuthError::bad_request("Name is required"));
    }

    check_password_length(&req.password)?;

    let existing = state
        .storage
        .get_user_by_email(&email)
        .await
        .map_err(AuthError::internal)?;
    if existing.is_some() {
        return Err(AuthError::unprocessable("User already exists"));
    }

    let password_hash = hash_password(&req.password).map_err(AuthError::internal)?;

    let user = state
        .storage
        .create_user(CreateUserRow {
            name: name.to_string(),
            email: email.clone(),
            email_verified: false,
            image: req.image.clone(),
            is_anonymous: false,
        })
        .await
        .map_err(sign_up_error)?;

    let identity = state
        .storage
        .create_identity(CreateIdentityRow {
            account_id: email,
            provider_id: EMAIL_PROVIDER_ID.to_string(),
            user_id: user.id,
            password: Some(password_hash),
            ..Default::default()
        })
        .await;
    if let Err(e) = identity {
        // No user without credentials
        if let Err(cleanup) = state.storage.delete_user(user.id).await {
            tracing::error!(
                user_id = %user.id,
                "Failed to remove user after sign-up error: {}",
                cleanup
            );
        }
        return Err(sign_up_error(e));
    }

    let session = state
        .auth
        .create_session(&state.storage, user.id, &ClientMeta::from_headers(&headers), None)
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(user_id = %user.id, "User signed up");

    let jar = jar.add(state.auth.session_cookie(&session.token, true));
    Ok((
        jar,
        Json(SessionTokenResponse {
            token: session.token,
            user: user.into(),
        }),
    ))
}

/// Unique violations mean a concurrent sign-up won the race
fn sign_up_error(err: anyhow::Error) -> AuthError {
    if is_conflict(&err) {
        AuthError::unprocessable("User already exists")
    } else {
        AuthError::internal(err)
    }
}

fn check_password_length(password: &str) -> Result<(), AuthError> {
    if password_length_ok(password) {
        return Ok(());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Err(AuthError::bad_request("Password too short"))
    } else {
        Err(AuthError::bad_request("Password too long"))
    }
}

/// POST /api/auth/sign-in/email - Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/sign-in/email",
    request_body = SignInEmailRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn sign_in_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<SignInEmailRequest>,
) -> Result<(CookieJar, Json<SignInResponse>), AuthError> {
    let invalid = || AuthError::unauthorized("Invalid email or password");
    let email = normalize_email(&req.email).ok_or_else(invalid)?;

    let user = state
        .storage
        .get_user_by_email(&email)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(invalid)?;

    let identity = state
        .storage
        .get_identity_by_provider(EMAIL_PROVIDER_ID, &user.email)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(invalid)?;

    let password_hash = identity.password.as_deref().ok_or_else(invalid)?;
    if !verify_password(&req.password, password_hash).map_err(AuthError::internal)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(invalid());
    }

    let remember = req.remember_me.unwrap_or(true);
    let lifetime = (!remember).then(|| Duration::days(1));
    let session = state
        .auth
        .create_session(
            &state.storage,
            user.id,
            &ClientMeta::from_headers(&headers),
            lifetime,
        )
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(user_id = %user.id, "User signed in");

    let jar = jar.add(state.auth.session_cookie(&session.token, remember));
    Ok((
        jar,
        Json(SignInResponse {
            redirect: false,
            token: session.token,
            url: None,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/sign-in/anonymous - Create a throwaway user and session
#[utoipa::path(
    post,
    path = "/api/auth/sign-in/anonymous",
    responses(
        (status = 200, description = "Anonymous user signed in", body = SessionTokenResponse),
        (status = 400, description = "Caller is already anonymous")
    ),
    tag = "auth"
)]
pub async fn sign_in_anonymous(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ctx: RequestContext,
) -> Result<(CookieJar, Json<SessionTokenResponse>), AuthError> {
    if ctx.user.as_ref().is_some_and(|u| u.is_anonymous) {
        return Err(AuthError::bad_request(
            "Anonymous users cannot sign in again anonymously",
        ));
    }

    let user = state
        .storage
        .create_user(CreateUserRow {
            name: "Anonymous".to_string(),
            email: format!("temp-{}@anonymous.local", Uuid::new_v4().simple()),
            email_verified: false,
            image: None,
            is_anonymous: true,
        })
        .await
        .map_err(AuthError::internal)?;

    let session = state
        .auth
        .create_session(&state.storage, user.id, &ClientMeta::from_headers(&headers), None)
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(user_id = %user.id, "Anonymous user signed in");

    let jar = jar.add(state.auth.session_cookie(&session.token, true));
    Ok((
        jar,
        Json(SessionTokenResponse {
            token: session.token,
            user: user.into(),
        }),
    ))
}

/// Resolve a redirect target against the API base URL. Only targets that land
/// on the API itself or an allowed origin are returned.
fn trusted_redirect(state: &AppState, target: &str) -> Option<String> {
    let base = Url::parse(&state.config.base_url).ok()?;
    let url = base.join(target).ok()?;
    let origin = url.origin().ascii_serialization();
    let trusted = origin == base.origin().ascii_serialization()
        || state.config.allowed_origins.iter().any(|o| *o == origin);
    trusted.then(|| url.into())
}

/// POST /api/auth/sign-in/social - Start an OAuth flow
#[utoipa::path(
    post,
    path = "/api/auth/sign-in/social",
    request_body = SocialSignInRequest,
    responses(
        (status = 200, description = "Provider authorization URL", body = SocialSignInResponse),
        (status = 403, description = "Callback URL not allowed"),
        (status = 404, description = "Provider not found or not configured")
    ),
    tag = "auth"
)]
pub async fn sign_in_social(
    State(state): State<AppState>,
    Json(req): Json<SocialSignInRequest>,
) -> Result<Json<SocialSignInResponse>, AuthError> {
    let provider =
        OAuthProvider::parse(&req.provider).ok_or_else(|| AuthError::not_found("Provider not found"))?;
    let google = match provider {
        OAuthProvider::Google => state.auth.google(),
    }
    .ok_or_else(|| AuthError::not_found("Provider not found"))?;

    for target in [
        &req.callback_url,
        &req.error_callback_url,
        &req.new_user_callback_url,
    ]
    .into_iter()
    .flatten()
    {
        if trusted_redirect(&state, target).is_none() {
            return Err(AuthError::forbidden("Invalid callbackURL"));
        }
    }

    let oauth_state = generate_oauth_state();
    let data = OAuthStateData {
        provider: provider.as_str().to_string(),
        callback_url: req.callback_url,
        error_callback_url: req.error_callback_url,
        new_user_callback_url: req.new_user_callback_url,
    };

    state
        .storage
        .create_verification(CreateVerificationRow {
            identifier: oauth_state_identifier(&oauth_state),
            value: serde_json::to_string(&data).map_err(AuthError::internal)?,
            expires_at: Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES),
        })
        .await
        .map_err(AuthError::internal)?;

    let url = google
        .authorization_url(&oauth_state)
        .map_err(AuthError::internal)?;

    Ok(Json(SocialSignInResponse {
        url,
        redirect: true,
    }))
}

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn with_error(target: &str, code: &str) -> String {
    match Url::parse(target) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("error", code);
            url.into()
        }
        Err(_) => format!("{}?error={}", target, code),
    }
}

/// Where an OAuth callback failure sends the browser
#[derive(Debug)]
struct CallbackFailure {
    target: String,
    code: String,
}

impl CallbackFailure {
    fn new(target: &str, code: &str) -> Self {
        Self {
            target: target.to_string(),
            code: code.to_string(),
        }
    }
}

/// GET /api/auth/callback/:provider - OAuth callback
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    match complete_oauth(&state, &provider, query, &ClientMeta::from_headers(&headers)).await {
        Ok((session, target)) => {
            let jar = jar.add(state.auth.session_cookie(&session.token, true));
            (jar, found(&target)).into_response()
        }
        Err(failure) => {
            tracing::warn!(provider = %provider, code = %failure.code, "OAuth callback failed");
            found(&with_error(&failure.target, &failure.code))
        }
    }
}

async fn complete_oauth(
    state: &AppState,
    provider: &str,
    query: OAuthCallbackQuery,
    meta: &ClientMeta,
) -> Result<(Session, String), CallbackFailure> {
    let base_url = state.config.base_url.as_str();
    let default_error = format!("{}/api/auth/error", base_url);

    let oauth_state = query
        .state
        .ok_or_else(|| CallbackFailure::new(&default_error, "state_not_found"))?;

    let verification = state
        .storage
        .get_verification(&oauth_state_identifier(&oauth_state))
        .await
        .map_err(|e| {
            tracing::error!("Failed to load OAuth state: {}", e);
            CallbackFailure::new(&default_error, "internal_server_error")
        })?
        .filter(|v| v.expires_at > Utc::now())
        .ok_or_else(|| CallbackFailure::new(&default_error, "please_restart_the_process"))?;

    // Single use, even when the rest of the flow fails
    if let Err(e) = state.storage.delete_verification(verification.id).await {
        tracing::warn!("Failed to delete OAuth state: {}", e);
    }

    let data: OAuthStateData = serde_json::from_str(&verification.value)
        .map_err(|_| CallbackFailure::new(&default_error, "invalid_state"))?;

    let error_target = data
        .error_callback_url
        .as_deref()
        .or(data.callback_url.as_deref())
        .and_then(|t| trusted_redirect(state, t))
        .unwrap_or(default_error);

    if let Some(error) = query.error {
        return Err(CallbackFailure::new(&error_target, &error));
    }
    if data.provider != provider {
        return Err(CallbackFailure::new(&error_target, "invalid_provider"));
    }

    let google = OAuthProvider::parse(provider)
        .and_then(|p| match p {
            OAuthProvider::Google => state.auth.google(),
        })
        .ok_or_else(|| CallbackFailure::new(&error_target, "oauth_provider_not_found"))?;

    let code = query
        .code
        .ok_or_else(|| CallbackFailure::new(&error_target, "no_code"))?;

    let profile = google.exchange_code(&code).await.map_err(|e| {
        tracing::error!("OAuth exchange failed: {}", e);
        CallbackFailure::new(&error_target, "invalid_code")
    })?;

    let (user, is_new) = link_or_create_user(state, provider, profile)
        .await
        .map_err(|code| CallbackFailure::new(&error_target, code))?;

    let session = state
        .auth
        .create_session(&state.storage, user.id, meta, None)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create session after OAuth: {}", e);
            CallbackFailure::new(&error_target, "internal_server_error")
        })?;

    tracing::info!(user_id = %user.id, provider, is_new, "OAuth sign-in completed");

    let target = if is_new {
        data.new_user_callback_url.or(data.callback_url)
    } else {
        data.callback_url
    };
    let target = trusted_redirect(state, target.as_deref().unwrap_or("/"))
        .unwrap_or_else(|| format!("{}/", base_url.trim_end_matches('/')));
    Ok((session, target))
}

/// Find the user behind an OAuth profile: existing identity, then a verified
/// email match (linking a new identity), then a brand new user.
/// Errors are OAuth error codes.
async fn link_or_create_user(
    state: &AppState,
    provider: &str,
    profile: OAuthProfile,
) -> Result<(User, bool), &'static str> {
    let storage = &state.storage;
    let internal = |e: anyhow::Error| {
        tracing::error!("Database error during OAuth: {}", e);
        "internal_server_error"
    };
    let OAuthProfile { user: info, tokens } = profile;

    if let Some(identity) = storage
        .get_identity_by_provider(provider, &info.account_id)
        .await
        .map_err(internal)?
    {
        storage
            .update_identity_tokens(
                identity.id,
                UpdateIdentityTokens {
                    access_token: Some(tokens.access_token),
                    refresh_token: tokens.refresh_token,
                    id_token: tokens.id_token,
                    access_token_expires_at: tokens.access_token_expires_at,
                    scope: tokens.scope,
                },
            )
            .await
            .map_err(internal)?;

        let user = storage
            .get_user(identity.user_id)
            .await
            .map_err(internal)?
            .ok_or("user_not_found")?;
        return Ok((user.into(), false));
    }

    let email = normalize_email(&info.email).ok_or("email_not_found")?;
    let identity = |user_id: Uuid| CreateIdentityRow {
        account_id: info.account_id.clone(),
        provider_id: provider.to_string(),
        user_id,
        access_token: Some(tokens.access_token.clone()),
        refresh_token: tokens.refresh_token.clone(),
        id_token: tokens.id_token.clone(),
        access_token_expires_at: tokens.access_token_expires_at,
        scope: tokens.scope.clone(),
        ..Default::default()
    };

    if let Some(existing) = storage.get_user_by_email(&email).await.map_err(internal)? {
        if !info.email_verified {
            return Err("account_not_linked");
        }
        storage
            .create_identity(identity(existing.id))
            .await
            .map_err(internal)?;

        let user = if existing.email_verified {
            existing
        } else {
            storage
                .update_user(
                    existing.id,
                    UpdateUser {
                        email_verified: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .map_err(internal)?
                .unwrap_or(existing)
        };
        tracing::info!(user_id = %user.id, provider, "Linked OAuth identity by email");
        return Ok((user.into(), false));
    }

    let user = storage
        .create_user(CreateUserRow {
            name: info.name.clone(),
            email,
            email_verified: info.email_verified,
            image: info.image.clone(),
            is_anonymous: false,
        })
        .await
        .map_err(internal)?;
    storage
        .create_identity(identity(user.id))
        .await
        .map_err(internal)?;

    Ok((user.into(), true))
}

/// GET /api/auth/get-session - Current session and user, or null
#[utoipa::path(
    get,
    path = "/api/auth/get-session",
    responses(
        (status = 200, description = "Current session, or null when signed out", body = SessionWithUser)
    ),
    tag = "auth"
)]
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Option<SessionWithUser>>), AuthError> {
    let resolved = state
        .auth
        .resolve_session(&state.storage, &headers)
        .await
        .map_err(AuthError::internal)?;

    match resolved {
        Some(resolved) => {
            let jar = if resolved.refreshed {
                jar.add(state.auth.session_cookie(&resolved.data.session.token, true))
            } else {
                jar
            };
            Ok((jar, Json(Some(resolved.data))))
        }
        None => Ok((jar, Json(None))),
    }
}

/// POST /api/auth/session/refresh - Extend the current session
#[utoipa::path(
    post,
    path = "/api/auth/session/refresh",
    responses(
        (status = 200, description = "Session extended", body = SessionWithUser),
        (status = 401, description = "Not signed in")
    ),
    tag = "auth"
)]
pub async fn refresh_session(
    State(state): State<AppState>,
    auth: AuthSession,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionWithUser>), AuthError> {
    let session = state
        .auth
        .extend_session(&state.storage, &auth.session)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::unauthorized("Session not found"))?;

    let remembered = state.auth.is_remembered(&session);
    let jar = jar.add(state.auth.session_cookie(&session.token, remembered));
    Ok((
        jar,
        Json(SessionWithUser {
            session,
            user: auth.user,
        }),
    ))
}

/// POST /api/auth/sign-out - Delete the session and clear the cookie
#[utoipa::path(
    post,
    path = "/api/auth/sign-out",
    responses((status = 200, description = "Signed out")),
    tag = "auth"
)]
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AuthError> {
    if let Some(token) = state.auth.token_from_headers(&headers) {
        state
            .storage
            .delete_session_by_token(&token)
            .await
            .map_err(AuthError::internal)?;
    }

    let jar = jar.remove(state.auth.removal_cookie());
    Ok((jar, Json(json!({ "success": true }))))
}

/// POST /api/auth/change-password - Replace the email/password credential
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ChangePasswordResponse),
        (status = 400, description = "Invalid password or no password credential"),
        (status = 401, description = "Not signed in")
    ),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthSession,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, Json<ChangePasswordResponse>), AuthError> {
    check_password_length(&req.new_password)?;

    let identity = state
        .storage
        .list_identities_for_user(auth.user.id)
        .await
        .map_err(AuthError::internal)?
        .into_iter()
        .find(|i| i.provider_id == EMAIL_PROVIDER_ID && i.password.is_some())
        .ok_or_else(|| AuthError::bad_request("Credential account not found"))?;

    let current_hash = identity.password.as_deref().unwrap_or_default();
    if !verify_password(&req.current_password, current_hash).map_err(AuthError::internal)? {
        return Err(AuthError::bad_request("Invalid password"));
    }

    let password_hash = hash_password(&req.new_password).map_err(AuthError::internal)?;
    state
        .storage
        .update_identity_password(identity.id, &password_hash)
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(user_id = %auth.user.id, "Password changed");

    if !req.revoke_other_sessions {
        return Ok((
            jar,
            Json(ChangePasswordResponse {
                token: None,
                user: auth.user,
            }),
        ));
    }

    let revoked = state
        .storage
        .delete_sessions_for_user(auth.user.id)
        .await
        .map_err(AuthError::internal)?;
    let session = state
        .auth
        .create_session(&state.storage, auth.user.id, &ClientMeta::from_headers(&headers), None)
        .await
        .map_err(AuthError::internal)?;
    tracing::info!(user_id = %auth.user.id, revoked, "Revoked sessions after password change");

    let jar = jar.add(state.auth.session_cookie(&session.token, true));
    Ok((
        jar,
        Json(ChangePasswordResponse {
            token: Some(session.token),
            user: auth.user,
        }),
    ))
}

/// POST /api/auth/revoke-sessions - Sign the user out everywhere
#[utoipa::path(
    post,
    path = "/api/auth/revoke-sessions",
    responses(
        (status = 200, description = "All sessions revoked"),
        (status = 401, description = "Not signed in")
    ),
    tag = "auth"
)]
pub async fn revoke_sessions(
    State(state): State<AppState>,
    auth: AuthSession,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AuthError> {
    let revoked = state
        .storage
        .delete_sessions_for_user(auth.user.id)
        .await
        .map_err(AuthError::internal)?;
    tracing::info!(user_id = %auth.user.id, revoked, "Revoked all sessions");

    let jar = jar.remove(state.auth.removal_cookie());
    Ok((jar, Json(json!({ "status": true }))))
}

/// GET /api/auth/ok - Liveness of the auth handler
pub async fn ok() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// GET /api/auth/error - Landing page for OAuth failures without a callback URL
pub async fn error_page(Query(query): Query<ErrorQuery>) -> AuthError {
    AuthError::bad_request(query.error.unwrap_or_else(|| "unknown_error".to_string()))
}

/// POST /api/auth/to-j-s-o-n - Devtools stub
pub async fn to_json() -> Json<serde_json::Value> {
    Json(json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").as_deref(),
            Some("alice@example.com")
        );
        assert!(normalize_email("no-at-sign").is_none());
        assert!(normalize_email("@example.com").is_none());
        assert!(normalize_email("a@b@c").is_none());
        assert!(normalize_email("a b@example.com").is_none());
    }

    #[test]
    fn test_oauth_state_is_hex() {
        let state = generate_oauth_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_redirect_helpers() {
        assert_eq!(
            with_error("https://app.jyoung2k.org/login", "no_code"),
            "https://app.jyoung2k.org/login?error=no_code"
        );
    }

    #[test]
    fn test_trusted_redirects() {
        let state = AppState::new(
            sophia_storage::StorageBackend::in_memory(),
            crate::config::ServerConfig::default(),
            "secret",
        );
        assert_eq!(
            trusted_redirect(&state, "/dashboard").as_deref(),
            Some("http://localhost:8787/dashboard")
        );
        assert_eq!(
            trusted_redirect(&state, "https://app.jyoung2k.org/home").as_deref(),
            Some("https://app.jyoung2k.org/home")
        );
        assert!(trusted_redirect(&state, "http://localhost:8787/x").is_some());
        assert!(trusted_redirect(&state, "https://evil.example.com/").is_none());

        // Relative-looking targets that resolve to another host
        for target in [
            "//evil.example.com",
            "/\\evil.example.com/x",
            "\\\\evil.example.com",
            "/\t/evil.example.com",
            "https:evil.example.com",
        ] {
            assert!(
                trusted_redirect(&state, target).is_none(),
                "accepted {target:?}"
            );
        }
    }
}
