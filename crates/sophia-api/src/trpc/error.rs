// Error types for tRPC procedures

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::fmt::Display;
use thiserror::Error;

/// Errors a procedure call can end with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrpcError {
    /// Input was not valid JSON
    #[error("{0}")]
    Parse(String),

    /// Input did not match the procedure's schema
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Unknown procedure or missing resource
    #[error("{0}")]
    NotFound(String),

    /// Query called with POST or mutation called with GET
    #[error("{0}")]
    MethodNotSupported(String),

    #[error("{0}")]
    Internal(String),
}

impl TrpcError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        TrpcError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        TrpcError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TrpcError::NotFound(msg.into())
    }

    pub fn unauthorized() -> Self {
        TrpcError::Unauthorized("UNAUTHORIZED".to_string())
    }

    /// Log the underlying failure and hide it from the client
    pub fn internal(err: impl Display) -> Self {
        tracing::error!("tRPC procedure failed: {}", err);
        TrpcError::Internal("Internal server error".to_string())
    }

    /// tRPC error code name
    pub fn code(&self) -> &'static str {
        match self {
            TrpcError::Parse(_) => "PARSE_ERROR",
            TrpcError::BadRequest(_) => "BAD_REQUEST",
            TrpcError::Unauthorized(_) => "UNAUTHORIZED",
            TrpcError::Forbidden(_) => "FORBIDDEN",
            TrpcError::NotFound(_) => "NOT_FOUND",
            TrpcError::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            TrpcError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// JSON-RPC 2.0 error code
    pub fn json_rpc_code(&self) -> i32 {
        match self {
            TrpcError::Parse(_) => -32700,
            TrpcError::BadRequest(_) => -32600,
            TrpcError::Unauthorized(_) => -32001,
            TrpcError::Forbidden(_) => -32003,
            TrpcError::NotFound(_) => -32004,
            TrpcError::MethodNotSupported(_) => -32005,
            TrpcError::Internal(_) => -32603,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            TrpcError::Parse(_) | TrpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            TrpcError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TrpcError::Forbidden(_) => StatusCode::FORBIDDEN,
            TrpcError::NotFound(_) => StatusCode::NOT_FOUND,
            TrpcError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            TrpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error envelope as sent on the wire
    pub fn to_envelope(&self, path: &str) -> Value {
        json!({
            "error": {
                "message": self.to_string(),
                "code": self.json_rpc_code(),
                "data": {
                    "code": self.code(),
                    "httpStatus": self.http_status().as_u16(),
                    "path": path,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        let err = TrpcError::forbidden("nope");
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(err.json_rpc_code(), -32003);
        assert_eq!(err.http_status(), StatusCode::FORBIDDEN);

        let err = TrpcError::MethodNotSupported("GET".to_string());
        assert_eq!(err.http_status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.json_rpc_code(), -32005);

        assert_eq!(
            TrpcError::Parse("bad".to_string()).http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_envelope() {
        let envelope = TrpcError::not_found("Organization not found").to_envelope("organization.byId");
        assert_eq!(
            envelope,
            json!({
                "error": {
                    "message": "Organization not found",
                    "code": -32004,
                    "data": {
                        "code": "NOT_FOUND",
                        "httpStatus": 404,
                        "path": "organization.byId"
                    }
                }
            })
        );
    }

    #[test]
    fn test_internal_hides_details() {
        let err = TrpcError::internal("pool timed out");
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
    }
}
