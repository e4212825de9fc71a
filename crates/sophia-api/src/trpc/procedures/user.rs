// user.* procedures

use serde::Deserialize;
use serde_json::Value;
use sophia_core::{LinkedIdentity, User};
use sophia_storage::UpdateUser;

use crate::context::RequestContext;
use crate::trpc::error::TrpcError;
use crate::trpc::router::{output, parse_input, require_user, ProcedureResult, TrpcRouter};

const MAX_NAME_LENGTH: usize = 100;

pub fn router() -> TrpcRouter {
    TrpcRouter::new()
        .query("me", me)
        .mutation("updateProfile", update_profile)
        .query("identities", identities)
}

async fn me(ctx: RequestContext, _input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    output(user)
}

#[derive(Debug, Deserialize)]
struct UpdateProfileInput {
    name: Option<String>,
    image: Option<String>,
}

async fn update_profile(ctx: RequestContext, input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    let input: UpdateProfileInput = parse_input(input)?;

    let name = match input.name.as_deref().map(str::trim) {
        Some("") => return Err(TrpcError::bad_request("Name cannot be empty")),
        Some(name) if name.chars().count() > MAX_NAME_LENGTH => {
            return Err(TrpcError::bad_request(format!(
                "Name must be at most {} characters",
                MAX_NAME_LENGTH
            )))
        }
        Some(name) => Some(name.to_string()),
        None => None,
    };

    let updated = ctx
        .storage
        .update_user(
            user.id,
            UpdateUser {
                name,
                image: input.image,
                email_verified: None,
            },
        )
        .await
        .map_err(TrpcError::internal)?
        .ok_or_else(|| TrpcError::not_found("User not found"))?;

    output(User::from(updated))
}

async fn identities(ctx: RequestContext, _input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    let identities: Vec<LinkedIdentity> = ctx
        .storage
        .list_identities_for_user(user.id)
        .await
        .map_err(TrpcError::internal)?
        .into_iter()
        .map(LinkedIdentity::from)
        .collect();
    output(identities)
}
