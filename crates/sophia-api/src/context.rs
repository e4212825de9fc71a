// Shared application state and per-request auth context
// Decision: Storage and the auth service are built once at startup and shared,
// instead of being constructed for every request
// Decision: RequestContext never rejects an anonymous caller; AuthSession does (401)

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sophia_core::{Session, User};
use sophia_storage::StorageBackend;
use std::sync::Arc;

use crate::auth::{AuthError, AuthService};
use crate::config::ServerConfig;

/// App state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageBackend,
    pub auth: Arc<AuthService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(storage: StorageBackend, config: ServerConfig, secret: &str) -> Self {
        let auth = Arc::new(AuthService::new(secret, &config));
        Self {
            storage,
            auth,
            config: Arc::new(config),
        }
    }
}

/// Everything a handler or procedure needs about the caller
#[derive(Clone)]
pub struct RequestContext {
    pub storage: StorageBackend,
    pub auth: Arc<AuthService>,
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl RequestContext {
    /// Resolve the caller's session from request headers
    pub async fn from_parts(parts: &Parts, state: &AppState) -> Result<Self, AuthError> {
        let resolved = state
            .auth
            .resolve_session(&state.storage, &parts.headers)
            .await
            .map_err(AuthError::internal)?;

        let (session, user) = match resolved {
            Some(resolved) => (
                Some(resolved.data.session),
                Some(resolved.data.user),
            ),
            None => (None, None),
        };

        Ok(Self {
            storage: state.storage.clone(),
            auth: state.auth.clone(),
            session,
            user,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        RequestContext::from_parts(parts, &app_state).await
    }
}

/// Extractor for an authenticated caller
/// This is required - returns 401 if there is no valid session
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session: Session,
    pub user: User,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        match (ctx.session, ctx.user) {
            (Some(session), Some(user)) => Ok(AuthSession { session, user }),
            _ => Err(AuthError::unauthorized("Unauthorized")),
        }
    }
}
