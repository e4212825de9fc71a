// organization.* procedures

use serde::Deserialize;
use serde_json::Value;
use sophia_core::Organization;
use uuid::Uuid;

use crate::auth::organization::{members_with_users, organization_with_members};
use crate::context::RequestContext;
use crate::trpc::error::TrpcError;
use crate::trpc::router::{output, parse_input, require_user, ProcedureResult, TrpcRouter};

pub fn router() -> TrpcRouter {
    TrpcRouter::new()
        .query("list", list)
        .query("byId", by_id)
        .query("members", members)
        .query("active", active)
}

/// Fails with FORBIDDEN unless the user belongs to the organization
async fn require_membership(
    ctx: &RequestContext,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<(), TrpcError> {
    let member = ctx
        .storage
        .get_member(organization_id, user_id)
        .await
        .map_err(TrpcError::internal)?;
    match member {
        Some(_) => Ok(()),
        None => Err(TrpcError::forbidden(
            "You are not a member of this organization",
        )),
    }
}

async fn list(ctx: RequestContext, _input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    let organizations: Vec<Organization> = ctx
        .storage
        .list_organizations_for_user(user.id)
        .await
        .map_err(TrpcError::internal)?
        .into_iter()
        .map(Organization::from)
        .collect();
    output(organizations)
}

#[derive(Debug, Deserialize)]
struct ByIdInput {
    id: Uuid,
}

async fn by_id(ctx: RequestContext, input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    let input: ByIdInput = parse_input(input)?;

    let organization: Organization = ctx
        .storage
        .get_organization(input.id)
        .await
        .map_err(TrpcError::internal)?
        .ok_or_else(|| TrpcError::not_found("Organization not found"))?
        .into();
    require_membership(&ctx, organization.id, user.id).await?;

    let organization = organization_with_members(&ctx.storage, organization)
        .await
        .map_err(TrpcError::internal)?;
    output(organization)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersInput {
    organization_id: Uuid,
}

async fn members(ctx: RequestContext, input: Value) -> ProcedureResult {
    let (_, user) = require_user(&ctx)?;
    let input: MembersInput = parse_input(input)?;
    require_membership(&ctx, input.organization_id, user.id).await?;

    let members = members_with_users(&ctx.storage, input.organization_id)
        .await
        .map_err(TrpcError::internal)?;
    output(members)
}

/// Active organization of the session, or null
async fn active(ctx: RequestContext, _input: Value) -> ProcedureResult {
    let (session, user) = require_user(&ctx)?;
    let Some(organization_id) = session.active_organization_id else {
        return Ok(Value::Null);
    };

    let organization = ctx
        .storage
        .get_organization(organization_id)
        .await
        .map_err(TrpcError::internal)?;
    let Some(organization) = organization else {
        return Ok(Value::Null);
    };

    let member = ctx
        .storage
        .get_member(organization_id, user.id)
        .await
        .map_err(TrpcError::internal)?;
    if member.is_none() {
        return Ok(Value::Null);
    }

    output(Organization::from(organization))
}
