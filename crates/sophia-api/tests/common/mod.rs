// Shared helpers for router-level tests against the in-memory backend
#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sophia_api::{build_app, AppState, ServerConfig};
use sophia_storage::StorageBackend;
use tower::ServiceExt;

pub const SESSION_COOKIE: &str = "better-auth.session_token";

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let state = AppState::new(StorageBackend::in_memory(), config, "test-secret");
        Self {
            router: build_app(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, None)).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.send(request(Method::POST, uri, cookie, Some(body))).await
    }

    /// Sign up and return the session cookie and the user JSON
    pub async fn sign_up(&self, name: &str, email: &str) -> (String, Value) {
        let response = self
            .post(
                "/api/auth/sign-up/email",
                None,
                serde_json::json!({
                    "name": name,
                    "email": email,
                    "password": "correct-horse-battery",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "sign-up failed: {:?}", response.json());
        let cookie = response.session_cookie().expect("sign-up sets a session cookie");
        (cookie, response.json()["user"].clone())
    }
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Percent-encode a JSON value for a `?input=` query parameter
pub fn encode_input(input: &Value) -> String {
    url::form_urlencoded::byte_serialize(input.to_string().as_bytes()).collect()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// `name=value` of the session cookie, ready for a Cookie header
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .filter(|c| c.starts_with(&format!("{}=", SESSION_COOKIE)))
            .map(|c| c.split(';').next().unwrap_or_default().to_string())
            .find(|c| c.len() > SESSION_COOKIE.len() + 1)
    }

    pub fn location(&self) -> Option<String> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}
