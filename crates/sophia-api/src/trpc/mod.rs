// tRPC-compatible HTTP adapter at /api/trpc
// Decision: Plain JSON on the wire (no transformer), matching the SPA's httpBatchLink
// Decision: Batch entries run concurrently against one resolved request context

pub mod error;
pub mod procedures;
pub mod router;

use axum::{
    body::Bytes,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthError;
use crate::context::{AppState, RequestContext};
use error::TrpcError;
use router::{ProcedureKind, ProcedureResult, TrpcRouter};

/// State for the tRPC routes
#[derive(Clone)]
pub struct TrpcState {
    pub app: AppState,
    pub router: Arc<TrpcRouter>,
}

impl FromRef<TrpcState> for AppState {
    fn from_ref(state: &TrpcState) -> Self {
        state.app.clone()
    }
}

/// Query parameters of a tRPC request
#[derive(Debug, Default, Deserialize)]
pub struct TrpcQuery {
    pub batch: Option<String>,
    pub input: Option<String>,
}

impl TrpcQuery {
    fn is_batch(&self) -> bool {
        matches!(self.batch.as_deref(), Some("1") | Some("true"))
    }
}

/// Create tRPC routes
pub fn routes(state: AppState) -> Router {
    let router = procedures::app_router();
    tracing::debug!(procedures = ?router.paths(), "tRPC procedures registered");

    let state = TrpcState {
        app: state,
        router: Arc::new(router),
    };

    Router::new()
        .route("/api/trpc/*path", get(handle_query).post(handle_mutation))
        .with_state(state)
}

async fn handle_query(
    State(state): State<TrpcState>,
    Path(path): Path<String>,
    Query(query): Query<TrpcQuery>,
    ctx: Result<RequestContext, AuthError>,
) -> Response {
    let raw = query.input.clone().unwrap_or_default();
    dispatch(&state.router, ProcedureKind::Query, &path, &query, &raw, ctx).await
}

async fn handle_mutation(
    State(state): State<TrpcState>,
    Path(path): Path<String>,
    Query(query): Query<TrpcQuery>,
    ctx: Result<RequestContext, AuthError>,
    body: Bytes,
) -> Response {
    let raw = String::from_utf8_lossy(&body);
    dispatch(&state.router, ProcedureKind::Mutation, &path, &query, &raw, ctx).await
}

/// Decode the raw input; empty input is `null`
fn parse_raw_input(raw: &str) -> Result<Value, TrpcError> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|e| TrpcError::Parse(format!("Invalid JSON input: {}", e)))
}

/// Split the input of a batch call into one value per procedure
pub fn batch_inputs(input: Value, count: usize) -> Result<Vec<Value>, TrpcError> {
    let mut map = match input {
        Value::Null => Default::default(),
        Value::Object(map) => map,
        _ => {
            return Err(TrpcError::bad_request(
                "Batch input must be an object keyed by call index",
            ))
        }
    };
    Ok((0..count)
        .map(|i| map.remove(&i.to_string()).unwrap_or(Value::Null))
        .collect())
}

fn success_envelope(data: Value) -> Value {
    json!({ "result": { "data": data } })
}

fn log_error(path: &str, err: &TrpcError) {
    match err {
        TrpcError::Internal(_) => tracing::error!(%path, code = err.code(), "tRPC error on path {}: {}", path, err),
        _ => tracing::warn!(%path, code = err.code(), "tRPC error on path {}: {}", path, err),
    }
}

async fn dispatch(
    router: &TrpcRouter,
    kind: ProcedureKind,
    path: &str,
    query: &TrpcQuery,
    raw_input: &str,
    ctx: Result<RequestContext, AuthError>,
) -> Response {
    let paths: Vec<&str> = if query.is_batch() {
        path.split(',').collect()
    } else {
        vec![path]
    };

    let prepared = ctx
        .map_err(|e| TrpcError::internal(e.error))
        .and_then(|ctx| {
            let input = parse_raw_input(raw_input)?;
            let inputs = if query.is_batch() {
                batch_inputs(input, paths.len())?
            } else {
                vec![input]
            };
            Ok((ctx, inputs))
        });

    let results: Vec<ProcedureResult> = match prepared {
        Ok((ctx, inputs)) => {
            let calls = paths
                .iter()
                .zip(inputs)
                .map(|(path, input)| router.call(kind, path, ctx.clone(), input));
            join_all(calls).await
        }
        Err(err) => paths.iter().map(|_| Err(err.clone())).collect(),
    };

    for (path, result) in paths.iter().zip(&results) {
        if let Err(err) = result {
            log_error(path, err);
        }
    }

    if !query.is_batch() {
        return match results.into_iter().next() {
            Some(Ok(data)) => Json(success_envelope(data)).into_response(),
            Some(Err(err)) => (err.http_status(), Json(err.to_envelope(path))).into_response(),
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };
    }

    let all_ok = results.iter().all(Result::is_ok);
    let envelopes: Vec<Value> = paths
        .iter()
        .zip(results)
        .map(|(path, result)| match result {
            Ok(data) => success_envelope(data),
            Err(err) => err.to_envelope(path),
        })
        .collect();

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(envelopes)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_flag() {
        let query = TrpcQuery {
            batch: Some("1".to_string()),
            input: None,
        };
        assert!(query.is_batch());
        assert!(!TrpcQuery::default().is_batch());
    }

    #[test]
    fn test_parse_raw_input() {
        assert_eq!(parse_raw_input("").unwrap(), Value::Null);
        assert_eq!(parse_raw_input("{\"id\":1}").unwrap(), json!({"id": 1}));
        assert_eq!(parse_raw_input("{oops").unwrap_err().code(), "PARSE_ERROR");
    }

    #[test]
    fn test_batch_inputs() {
        let inputs = batch_inputs(json!({"0": {"a": 1}, "2": "x"}), 3).unwrap();
        assert_eq!(inputs, vec![json!({"a": 1}), Value::Null, json!("x")]);

        assert_eq!(batch_inputs(Value::Null, 2).unwrap(), vec![Value::Null, Value::Null]);
        assert!(batch_inputs(json!([1, 2]), 2).is_err());
    }
}
