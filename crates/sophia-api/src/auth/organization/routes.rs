// Organization HTTP routes under /api/auth/organization

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sophia_core::{Invitation, InvitationStatus, Member, MemberWithUser, Organization, Session};
use sophia_storage::{
    is_conflict, CreateInvitationRow, CreateMemberRow, CreateOrganizationRow, MemberRow, UpdateOrganization,
};
use utoipa::ToSchema;
use uuid::Uuid;

use super::rbac::{has_permission_any, is_owner, is_valid_role, Action, Resource};
use super::{
    full_organization, member_with_user, members_with_users, organization_with_members,
    owner_count, FullOrganization, OrganizationWithMembers, CREATOR_ROLE, INVITATION_TTL_HOURS,
    ORGANIZATION_LIMIT,
};
use crate::auth::{routes::normalize_email, AuthError};
use crate::context::{AppState, AuthSession};

const DEFAULT_MEMBER_PAGE: usize = 100;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    /// Leave the session's active organization unchanged
    pub keep_current_active_organization: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrganizationData {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub logo: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub organization_id: Option<Uuid>,
    pub data: UpdateOrganizationData,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrganizationRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationQuery {
    pub organization_id: Option<Uuid>,
    pub organization_slug: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveOrganizationRequest {
    /// null clears the active organization
    pub organization_id: Option<Uuid>,
    pub organization_slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteMemberRequest {
    pub email: String,
    pub role: String,
    pub organization_id: Option<Uuid>,
    /// Replace a pending invitation for the same email
    pub resend: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationIdRequest {
    pub invitation_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    /// Member id, or the email of the member's user
    pub member_id_or_email: String,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    pub member_id: Uuid,
    pub role: String,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersQuery {
    pub organization_id: Option<Uuid>,
    pub organization_slug: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckSlugRequest {
    pub slug: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckSlugResponse {
    /// true when the slug is available
    pub status: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub invitation: Invitation,
    pub member: Option<Member>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub member: MemberWithUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedMemberResponse {
    pub member: Member,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMembersResponse {
    pub members: Vec<MemberWithUser>,
    pub total: usize,
}

/// Create organization routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/organization/create", post(create_organization))
        .route("/api/auth/organization/update", post(update_organization))
        .route("/api/auth/organization/delete", post(delete_organization))
        .route("/api/auth/organization/list", get(list_organizations))
        .route(
            "/api/auth/organization/get-full-organization",
            get(get_full_organization),
        )
        .route("/api/auth/organization/set-active", post(set_active_organization))
        .route("/api/auth/organization/invite-member", post(invite_member))
        .route("/api/auth/organization/accept-invitation", post(accept_invitation))
        .route("/api/auth/organization/reject-invitation", post(reject_invitation))
        .route("/api/auth/organization/cancel-invitation", post(cancel_invitation))
        .route("/api/auth/organization/remove-member", post(remove_member))
        .route(
            "/api/auth/organization/update-member-role",
            post(update_member_role),
        )
        .route("/api/auth/organization/list-members", get(list_members))
        .route("/api/auth/organization/check-slug", post(check_slug))
}

/// Organization named by id or slug, falling back to the session's active one.
/// `Ok(None)` when nothing names an organization.
async fn find_organization(
    state: &AppState,
    organization_id: Option<Uuid>,
    organization_slug: Option<&str>,
    session: &Session,
) -> Result<Option<Organization>, AuthError> {
    let row = if let Some(slug) = organization_slug.filter(|_| organization_id.is_none()) {
        state
            .storage
            .get_organization_by_slug(slug)
            .await
            .map_err(AuthError::internal)?
    } else if let Some(id) = organization_id.or(session.active_organization_id) {
        state
            .storage
            .get_organization(id)
            .await
            .map_err(AuthError::internal)?
    } else {
        return Ok(None);
    };

    row.map(Organization::from)
        .map(Some)
        .ok_or_else(|| AuthError::not_found("Organization not found"))
}

async fn require_organization(
    state: &AppState,
    organization_id: Option<Uuid>,
    organization_slug: Option<&str>,
    session: &Session,
) -> Result<Organization, AuthError> {
    find_organization(state, organization_id, organization_slug, session)
        .await?
        .ok_or_else(|| AuthError::bad_request("No active organization"))
}

async fn require_member(
    state: &AppState,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRow, AuthError> {
    state
        .storage
        .get_member(organization_id, user_id)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::forbidden("You are not a member of this organization"))
}

fn require_permission(
    member: &MemberRow,
    resource: Resource,
    action: Action,
    message: &str,
) -> Result<(), AuthError> {
    if has_permission_any(&member.role, resource, action) {
        Ok(())
    } else {
        Err(AuthError::forbidden(message))
    }
}

/// POST /api/auth/organization/create
#[utoipa::path(
    post,
    path = "/api/auth/organization/create",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 200, description = "Organization created", body = OrganizationWithMembers),
        (status = 400, description = "Invalid name or slug taken"),
        (status = 403, description = "Organization limit reached")
    ),
    tag = "organization"
)]
pub async fn create_organization(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<Json<OrganizationWithMembers>, AuthError> {
    let name = required(&req.name, "Name is required")?;
    let slug = required(&req.slug, "Slug is required")?;

    let memberships = state
        .storage
        .count_memberships_for_user(auth.user.id)
        .await
        .map_err(AuthError::internal)?;
    if memberships >= ORGANIZATION_LIMIT {
        return Err(AuthError::forbidden(
            "You have reached the maximum number of organizations",
        ));
    }

    let taken = state
        .storage
        .get_organization_by_slug(slug)
        .await
        .map_err(AuthError::internal)?;
    if taken.is_some() {
        return Err(AuthError::bad_request("Organization already exists"));
    }

    let organization: Organization = state
        .storage
        .create_organization(CreateOrganizationRow {
            name: name.to_string(),
            slug: slug.to_string(),
            logo: req.logo,
            metadata: req.metadata.map(|m| m.to_string()),
        })
        .await
        .map_err(|e| slug_conflict(e, "Organization already exists"))?
        .into();

    state
        .storage
        .create_member(CreateMemberRow {
            organization_id: organization.id,
            user_id: auth.user.id,
            role: CREATOR_ROLE.to_string(),
        })
        .await
        .map_err(AuthError::internal)?;

    if !req.keep_current_active_organization.unwrap_or(false) {
        state
            .storage
            .set_active_organization(auth.session.id, Some(organization.id))
            .await
            .map_err(AuthError::internal)?;
    }

    tracing::info!(
        organization_id = %organization.id,
        user_id = %auth.user.id,
        "Organization created"
    );

    let response = organization_with_members(&state.storage, organization)
        .await
        .map_err(AuthError::internal)?;
    Ok(Json(response))
}

/// POST /api/auth/organization/update
#[utoipa::path(
    post,
    path = "/api/auth/organization/update",
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = Organization),
        (status = 403, description = "Not allowed")
    ),
    tag = "organization"
)]
pub async fn update_organization(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, AuthError> {
    let organization = require_organization(&state, req.organization_id, None, &auth.session).await?;
    let member = require_member(&state, organization.id, auth.user.id).await?;
    require_permission(
        &member,
        Resource::Organization,
        Action::Update,
        "You are not allowed to update this organization",
    )?;

    let data = req.data;
    let name = data
        .name
        .as_deref()
        .map(|n| required(n, "Name is required"))
        .transpose()?;
    let slug = data
        .slug
        .as_deref()
        .map(|s| required(s, "Slug is required"))
        .transpose()?;
    if let Some(slug) = slug {
        let taken = state
            .storage
            .get_organization_by_slug(slug)
            .await
            .map_err(AuthError::internal)?;
        if taken.is_some_and(|o| o.id != organization.id) {
            return Err(AuthError::bad_request("Organization slug already taken"));
        }
    }

    let updated = state
        .storage
        .update_organization(
            organization.id,
            UpdateOrganization {
                name: name.map(str::to_string),
                slug: slug.map(str::to_string),
                logo: data.logo,
                metadata: data.metadata.map(|m| m.to_string()),
            },
        )
        .await
        .map_err(|e| slug_conflict(e, "Organization slug already taken"))?
        .ok_or_else(|| AuthError::not_found("Organization not found"))?;

    Ok(Json(updated.into()))
}

/// Trimmed value, or 400 with `message` when blank
fn required<'a>(value: &'a str, message: &str) -> Result<&'a str, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::bad_request(message));
    }
    Ok(value)
}

/// A slug claimed between the lookup and the write
fn slug_conflict(err: anyhow::Error, message: &str) -> AuthError {
    if is_conflict(&err) {
        AuthError::bad_request(message)
    } else {
        AuthError::internal(err)
    }
}

/// POST /api/auth/organization/delete
#[utoipa::path(
    post,
    path = "/api/auth/organization/delete",
    request_body = DeleteOrganizationRequest,
    responses(
        (status = 200, description = "Deleted organization", body = Organization),
        (status = 403, description = "Only owners may delete")
    ),
    tag = "organization"
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<DeleteOrganizationRequest>,
) -> Result<Json<Organization>, AuthError> {
    let organization =
        require_organization(&state, Some(req.organization_id), None, &auth.session).await?;
    let member = require_member(&state, organization.id, auth.user.id).await?;
    require_permission(
        &member,
        Resource::Organization,
        Action::Delete,
        "You are not allowed to delete this organization",
    )?;

    state
        .storage
        .delete_organization(organization.id)
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(organization_id = %organization.id, "Organization deleted");
    Ok(Json(organization))
}

/// GET /api/auth/organization/list
#[utoipa::path(
    get,
    path = "/api/auth/organization/list",
    responses((status = 200, description = "Organizations of the caller", body = Vec<Organization>)),
    tag = "organization"
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Vec<Organization>>, AuthError> {
    let organizations = state
        .storage
        .list_organizations_for_user(auth.user.id)
        .await
        .map_err(AuthError::internal)?
        .into_iter()
        .map(Organization::from)
        .collect();
    Ok(Json(organizations))
}

/// GET /api/auth/organization/get-full-organization
#[utoipa::path(
    get,
    path = "/api/auth/organization/get-full-organization",
    responses(
        (status = 200, description = "Organization with members and invitations, or null", body = FullOrganization),
        (status = 403, description = "Not a member")
    ),
    tag = "organization"
)]
pub async fn get_full_organization(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<OrganizationQuery>,
) -> Result<Json<Option<FullOrganization>>, AuthError> {
    let Some(organization) = find_organization(
        &state,
        query.organization_id,
        query.organization_slug.as_deref(),
        &auth.session,
    )
    .await?
    else {
        return Ok(Json(None));
    };

    require_member(&state, organization.id, auth.user.id).await?;
    let full = full_organization(&state.storage, organization)
        .await
        .map_err(AuthError::internal)?;
    Ok(Json(Some(full)))
}

/// POST /api/auth/organization/set-active
#[utoipa::path(
    post,
    path = "/api/auth/organization/set-active",
    request_body = SetActiveOrganizationRequest,
    responses(
        (status = 200, description = "New active organization, or null when cleared", body = FullOrganization),
        (status = 403, description = "Not a member")
    ),
    tag = "organization"
)]
pub async fn set_active_organization(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<SetActiveOrganizationRequest>,
) -> Result<Json<Option<FullOrganization>>, AuthError> {
    if req.organization_id.is_none() && req.organization_slug.is_none() {
        state
            .storage
            .set_active_organization(auth.session.id, None)
            .await
            .map_err(AuthError::internal)?;
        return Ok(Json(None));
    }

    let organization = require_organization(
        &state,
        req.organization_id,
        req.organization_slug.as_deref(),
        &auth.session,
    )
    .await?;
    require_member(&state, organization.id, auth.user.id).await?;

    state
        .storage
        .set_active_organization(auth.session.id, Some(organization.id))
        .await
        .map_err(AuthError::internal)?;

    let full = full_organization(&state.storage, organization)
        .await
        .map_err(AuthError::internal)?;
    Ok(Json(Some(full)))
}

/// POST /api/auth/organization/invite-member
#[utoipa::path(
    post,
    path = "/api/auth/organization/invite-member",
    request_body = InviteMemberRequest,
    responses(
        (status = 200, description = "Invitation created", body = Invitation),
        (status = 400, description = "Invalid role, or already a member or invited"),
        (status = 403, description = "Not allowed to invite")
    ),
    tag = "organization"
)]
pub async fn invite_member(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<InviteMemberRequest>,
) -> Result<Json<Invitation>, AuthError> {
    let organization = require_organization(&state, req.organization_id, None, &auth.session).await?;
    let inviter = require_member(&state, organization.id, auth.user.id).await?;
    require_permission(
        &inviter,
        Resource::Invitation,
        Action::Create,
        "You are not allowed to invite users to this organization",
    )?;

    let email = normalize_email(&req.email).ok_or_else(|| AuthError::bad_request("Invalid email"))?;
    if !is_valid_role(&req.role) {
        return Err(AuthError::bad_request("Invalid role"));
    }
    if is_owner(&req.role) && !is_owner(&inviter.role) {
        return Err(AuthError::forbidden(
            "You are not allowed to invite a user with this role",
        ));
    }

    if let Some(existing) = state
        .storage
        .get_user_by_email(&email)
        .await
        .map_err(AuthError::internal)?
    {
        let membership = state
            .storage
            .get_member(organization.id, existing.id)
            .await
            .map_err(AuthError::internal)?;
        if membership.is_some() {
            return Err(AuthError::bad_request(
                "User is already a member of this organization",
            ));
        }
    }

    let now = Utc::now();
    let pending: Vec<Invitation> = state
        .storage
        .list_invitations(organization.id)
        .await
        .map_err(AuthError::internal)?
        .into_iter()
        .map(Invitation::from)
        .filter(|i| i.email == email && i.is_open_at(now))
        .collect();

    if !pending.is_empty() {
        if !req.resend.unwrap_or(false) {
            return Err(AuthError::bad_request(
                "User is already invited to this organization",
            ));
        }
        for invitation in &pending {
            state
                .storage
                .update_invitation_status(invitation.id, "canceled")
                .await
                .map_err(AuthError::internal)?;
        }
    }

    let invitation: Invitation = state
        .storage
        .create_invitation(CreateInvitationRow {
            organization_id: organization.id,
            email,
            role: req.role.trim().to_string(),
            expires_at: now + Duration::hours(INVITATION_TTL_HOURS),
            inviter_id: auth.user.id,
        })
        .await
        .map_err(AuthError::internal)?
        .into();

    // No mail transport is configured; the invitee finds it via the SPA
    tracing::info!(
        invitation_id = %invitation.id,
        organization_id = %organization.id,
        "Invitation created"
    );
    Ok(Json(invitation))
}

/// Open invitation addressed to the caller
async fn invitation_for_recipient(
    state: &AppState,
    auth: &AuthSession,
    invitation_id: Uuid,
) -> Result<Invitation, AuthError> {
    let invitation: Invitation = state
        .storage
        .get_invitation(invitation_id)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Invitation not found"))?
        .into();

    if !invitation.is_open_at(Utc::now()) {
        return Err(AuthError::bad_request("Invitation not found or expired"));
    }
    if !invitation.email.eq_ignore_ascii_case(&auth.user.email) {
        return Err(AuthError::forbidden(
            "You are not the recipient of the invitation",
        ));
    }
    Ok(invitation)
}

/// POST /api/auth/organization/accept-invitation
#[utoipa::path(
    post,
    path = "/api/auth/organization/accept-invitation",
    request_body = InvitationIdRequest,
    responses(
        (status = 200, description = "Invitation accepted", body = InvitationResponse),
        (status = 403, description = "Invitation addressed to someone else")
    ),
    tag = "organization"
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<InvitationIdRequest>,
) -> Result<Json<InvitationResponse>, AuthError> {
    let invitation = invitation_for_recipient(&state, &auth, req.invitation_id).await?;

    let existing = state
        .storage
        .get_member(invitation.organization_id, auth.user.id)
        .await
        .map_err(AuthError::internal)?;
    let member = match existing {
        Some(member) => member,
        None => state
            .storage
            .create_member(CreateMemberRow {
                organization_id: invitation.organization_id,
                user_id: auth.user.id,
                role: invitation.role.clone(),
            })
            .await
            .map_err(AuthError::internal)?,
    };

    let invitation = state
        .storage
        .update_invitation_status(invitation.id, "accepted")
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Invitation not found"))?;

    state
        .storage
        .set_active_organization(auth.session.id, Some(invitation.organization_id))
        .await
        .map_err(AuthError::internal)?;

    tracing::info!(
        invitation_id = %invitation.id,
        user_id = %auth.user.id,
        "Invitation accepted"
    );
    Ok(Json(InvitationResponse {
        invitation: invitation.into(),
        member: Some(member.into()),
    }))
}

/// POST /api/auth/organization/reject-invitation
#[utoipa::path(
    post,
    path = "/api/auth/organization/reject-invitation",
    request_body = InvitationIdRequest,
    responses((status = 200, description = "Invitation rejected", body = InvitationResponse)),
    tag = "organization"
)]
pub async fn reject_invitation(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<InvitationIdRequest>,
) -> Result<Json<InvitationResponse>, AuthError> {
    let invitation = invitation_for_recipient(&state, &auth, req.invitation_id).await?;
    let invitation = state
        .storage
        .update_invitation_status(invitation.id, "rejected")
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Invitation not found"))?;

    Ok(Json(InvitationResponse {
        invitation: invitation.into(),
        member: None,
    }))
}

/// POST /api/auth/organization/cancel-invitation
#[utoipa::path(
    post,
    path = "/api/auth/organization/cancel-invitation",
    request_body = InvitationIdRequest,
    responses(
        (status = 200, description = "Invitation canceled", body = Invitation),
        (status = 400, description = "Invitation is no longer pending"),
        (status = 403, description = "Not allowed to cancel")
    ),
    tag = "organization"
)]
pub async fn cancel_invitation(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<InvitationIdRequest>,
) -> Result<Json<Invitation>, AuthError> {
    let invitation = state
        .storage
        .get_invitation(req.invitation_id)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Invitation not found"))?;

    let member = require_member(&state, invitation.organization_id, auth.user.id).await?;
    require_permission(
        &member,
        Resource::Invitation,
        Action::Cancel,
        "You are not allowed to cancel this invitation",
    )?;

    if InvitationStatus::from(invitation.status.as_str()) != InvitationStatus::Pending {
        return Err(AuthError::bad_request("Invitation is no longer pending"));
    }

    let invitation = state
        .storage
        .update_invitation_status(invitation.id, "canceled")
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Invitation not found"))?;
    Ok(Json(invitation.into()))
}

/// POST /api/auth/organization/remove-member
#[utoipa::path(
    post,
    path = "/api/auth/organization/remove-member",
    request_body = RemoveMemberRequest,
    responses(
        (status = 200, description = "Member removed", body = RemovedMemberResponse),
        (status = 400, description = "Last owner cannot be removed"),
        (status = 403, description = "Not allowed")
    ),
    tag = "organization"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<RemoveMemberRequest>,
) -> Result<Json<RemovedMemberResponse>, AuthError> {
    let organization = require_organization(&state, req.organization_id, None, &auth.session).await?;
    let caller = require_member(&state, organization.id, auth.user.id).await?;

    let target = if let Ok(member_id) = Uuid::parse_str(&req.member_id_or_email) {
        state
            .storage
            .get_member_by_id(member_id)
            .await
            .map_err(AuthError::internal)?
    } else {
        let email = normalize_email(&req.member_id_or_email)
            .ok_or_else(|| AuthError::bad_request("Invalid email"))?;
        match state
            .storage
            .get_user_by_email(&email)
            .await
            .map_err(AuthError::internal)?
        {
            Some(user) => state
                .storage
                .get_member(organization.id, user.id)
                .await
                .map_err(AuthError::internal)?,
            None => None,
        }
    }
    .filter(|m| m.organization_id == organization.id)
    .ok_or_else(|| AuthError::not_found("Member not found"))?;

    let is_self = target.user_id == auth.user.id;
    if !is_self {
        require_permission(
            &caller,
            Resource::Member,
            Action::Delete,
            "You are not allowed to delete this member",
        )?;
        if is_owner(&target.role) && !is_owner(&caller.role) {
            return Err(AuthError::forbidden("You cannot remove an owner"));
        }
    }

    if is_owner(&target.role) {
        let members = state
            .storage
            .list_members(organization.id)
            .await
            .map_err(AuthError::internal)?;
        if owner_count(&members) <= 1 {
            return Err(AuthError::bad_request(
                "Cannot remove the last owner from an organization",
            ));
        }
    }

    state
        .storage
        .delete_member(target.id)
        .await
        .map_err(AuthError::internal)?;

    if is_self && auth.session.active_organization_id == Some(organization.id) {
        state
            .storage
            .set_active_organization(auth.session.id, None)
            .await
            .map_err(AuthError::internal)?;
    }

    tracing::info!(
        organization_id = %organization.id,
        member_id = %target.id,
        "Member removed"
    );
    Ok(Json(RemovedMemberResponse {
        member: target.into(),
    }))
}

/// POST /api/auth/organization/update-member-role
#[utoipa::path(
    post,
    path = "/api/auth/organization/update-member-role",
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = MemberResponse),
        (status = 400, description = "Invalid role or last owner demotion"),
        (status = 403, description = "Not allowed")
    ),
    tag = "organization"
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<MemberResponse>, AuthError> {
    let organization = require_organization(&state, req.organization_id, None, &auth.session).await?;
    let caller = require_member(&state, organization.id, auth.user.id).await?;
    require_permission(
        &caller,
        Resource::Member,
        Action::Update,
        "You are not allowed to update this member",
    )?;

    let role = req.role.trim();
    if !is_valid_role(role) {
        return Err(AuthError::bad_request("Invalid role"));
    }

    let target = state
        .storage
        .get_member_by_id(req.member_id)
        .await
        .map_err(AuthError::internal)?
        .filter(|m| m.organization_id == organization.id)
        .ok_or_else(|| AuthError::not_found("Member not found"))?;

    if (is_owner(&target.role) || is_owner(role)) && !is_owner(&caller.role) {
        return Err(AuthError::forbidden(
            "You are not allowed to update this member",
        ));
    }

    if is_owner(&target.role) && !is_owner(role) {
        let members = state
            .storage
            .list_members(organization.id)
            .await
            .map_err(AuthError::internal)?;
        if owner_count(&members) <= 1 {
            return Err(AuthError::bad_request(
                "Cannot demote the last owner. Transfer ownership first.",
            ));
        }
    }

    let updated = state
        .storage
        .update_member_role(target.id, role)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Member not found"))?;

    let member = member_with_user(&state.storage, updated)
        .await
        .map_err(AuthError::internal)?
        .ok_or_else(|| AuthError::not_found("Member not found"))?;
    Ok(Json(MemberResponse { member }))
}

/// GET /api/auth/organization/list-members
#[utoipa::path(
    get,
    path = "/api/auth/organization/list-members",
    responses(
        (status = 200, description = "Members of the organization", body = ListMembersResponse),
        (status = 403, description = "Not a member")
    ),
    tag = "organization"
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<ListMembersQuery>,
) -> Result<Json<ListMembersResponse>, AuthError> {
    let organization = require_organization(
        &state,
        query.organization_id,
        query.organization_slug.as_deref(),
        &auth.session,
    )
    .await?;
    require_member(&state, organization.id, auth.user.id).await?;

    let members = members_with_users(&state.storage, organization.id)
        .await
        .map_err(AuthError::internal)?;
    let total = members.len();
    let members = members
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(DEFAULT_MEMBER_PAGE))
        .collect();

    Ok(Json(ListMembersResponse { members, total }))
}

/// POST /api/auth/organization/check-slug
#[utoipa::path(
    post,
    path = "/api/auth/organization/check-slug",
    request_body = CheckSlugRequest,
    responses((status = 200, description = "Slug availability", body = CheckSlugResponse)),
    tag = "organization"
)]
pub async fn check_slug(
    State(state): State<AppState>,
    _auth: AuthSession,
    Json(req): Json<CheckSlugRequest>,
) -> Result<Json<CheckSlugResponse>, AuthError> {
    let existing = state
        .storage
        .get_organization_by_slug(req.slug.trim())
        .await
        .map_err(AuthError::internal)?;
    Ok(Json(CheckSlugResponse {
        status: existing.is_none(),
    }))
}
