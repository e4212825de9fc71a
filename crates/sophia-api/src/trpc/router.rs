// Procedure registry
//
// Procedures are registered under dotted paths ("user.me") and work on JSON:
// the adapter hands them the decoded input and serializes whatever they
// return. Sub-routers are merged under a prefix, mirroring
// `router({ user: userRouter, ... })`.

use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sophia_core::{Session, User};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::error::TrpcError;
use crate::context::RequestContext;

pub type ProcedureResult = Result<Value, TrpcError>;

type Handler =
    Arc<dyn Fn(RequestContext, Value) -> BoxFuture<'static, ProcedureResult> + Send + Sync>;

/// Queries are called with GET, mutations with POST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl ProcedureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        }
    }
}

#[derive(Clone)]
struct Procedure {
    kind: ProcedureKind,
    handler: Handler,
}

/// Registry of procedures by path
#[derive(Clone, Default)]
pub struct TrpcRouter {
    procedures: HashMap<String, Procedure>,
}

impl TrpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn register<F, Fut>(mut self, path: &str, kind: ProcedureKind, handler: F) -> Self
    where
        F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |ctx: RequestContext, input: Value| -> BoxFuture<'static, ProcedureResult> {
                Box::pin(handler(ctx, input))
            },
        );
        self.procedures
            .insert(path.to_string(), Procedure { kind, handler });
        self
    }

    pub fn query<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        self.register(path, ProcedureKind::Query, handler)
    }

    pub fn mutation<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        self.register(path, ProcedureKind::Mutation, handler)
    }

    /// Mount every procedure of `other` under `prefix.`
    pub fn merge(mut self, prefix: &str, other: TrpcRouter) -> Self {
        for (path, procedure) in other.procedures {
            self.procedures
                .insert(format!("{}.{}", prefix, path), procedure);
        }
        self
    }

    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.procedures.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Run the procedure at `path` as `kind`
    pub async fn call(
        &self,
        kind: ProcedureKind,
        path: &str,
        ctx: RequestContext,
        input: Value,
    ) -> ProcedureResult {
        let procedure = self.procedures.get(path).ok_or_else(|| {
            TrpcError::not_found(format!(
                "No \"{}\"-procedure on path \"{}\"",
                kind.as_str(),
                path
            ))
        })?;

        if procedure.kind != kind {
            return Err(TrpcError::MethodNotSupported(format!(
                "Unsupported {} for {} procedure",
                match kind {
                    ProcedureKind::Query => "GET",
                    ProcedureKind::Mutation => "POST",
                },
                procedure.kind.as_str()
            )));
        }

        (procedure.handler)(ctx, input).await
    }
}

/// Decode procedure input; a missing input decodes like `{}`
pub fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, TrpcError> {
    let input = match input {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(input).map_err(|e| TrpcError::bad_request(e.to_string()))
}

/// Encode procedure output
pub fn output<T: Serialize>(value: T) -> ProcedureResult {
    serde_json::to_value(value).map_err(TrpcError::internal)
}

/// Session and user of a protected procedure
pub fn require_user(ctx: &RequestContext) -> Result<(&Session, &User), TrpcError> {
    match (&ctx.session, &ctx.user) {
        (Some(session), Some(user)) => Ok((session, user)),
        _ => Err(TrpcError::unauthorized()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::ServerConfig;
    use serde::Deserialize;
    use serde_json::json;
    use sophia_storage::StorageBackend;

    fn anonymous_ctx() -> RequestContext {
        RequestContext {
            storage: StorageBackend::in_memory(),
            auth: Arc::new(AuthService::new("secret", &ServerConfig::default())),
            session: None,
            user: None,
        }
    }

    async fn echo(_ctx: RequestContext, input: Value) -> ProcedureResult {
        Ok(input)
    }

    async fn whoami(ctx: RequestContext, _input: Value) -> ProcedureResult {
        let (_, user) = require_user(&ctx)?;
        output(&user.email)
    }

    fn router() -> TrpcRouter {
        TrpcRouter::new().merge(
            "test",
            TrpcRouter::new()
                .query("echo", echo)
                .mutation("save", echo)
                .query("whoami", whoami),
        )
    }

    #[tokio::test]
    async fn test_call_by_merged_path() {
        let router = router();
        assert_eq!(router.paths(), vec!["test.echo", "test.save", "test.whoami"]);

        let result = router
            .call(ProcedureKind::Query, "test.echo", anonymous_ctx(), json!({"a": 1}))
            .await;
        assert_eq!(result, Ok(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_unknown_and_mismatched_procedures() {
        let router = router();
        let err = router
            .call(ProcedureKind::Query, "test.missing", anonymous_ctx(), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = router
            .call(ProcedureKind::Query, "test.save", anonymous_ctx(), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "METHOD_NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn test_protected_procedure_rejects_anonymous() {
        let err = router()
            .call(ProcedureKind::Query, "test.whoami", anonymous_ctx(), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err, TrpcError::unauthorized());
    }

    #[test]
    fn test_parse_input() {
        #[derive(Debug, Deserialize)]
        struct Input {
            name: Option<String>,
        }

        let input: Input = parse_input(Value::Null).unwrap();
        assert!(input.name.is_none());

        let input: Input = parse_input(json!({"name": "Ada"})).unwrap();
        assert_eq!(input.name.as_deref(), Some("Ada"));

        let err = parse_input::<Input>(json!({"name": 5})).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
