// OpenAPI specification of the auth surface
//
// Served at /api/auth/open-api/generate-schema and written out by the
// export-openapi binary.

use axum::Json;
use sophia_core::{
    Invitation, InvitationStatus, LinkedIdentity, Member, MemberUser, MemberWithUser,
    Organization, Session, SessionWithUser, User,
};
use utoipa::OpenApi;

use crate::auth::organization::{self, routes as org};
use crate::auth::routes as auth;

/// OpenAPI documentation for the auth API
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::sign_up_email,
        auth::sign_in_email,
        auth::sign_in_anonymous,
        auth::sign_in_social,
        auth::get_session,
        auth::refresh_session,
        auth::sign_out,
        auth::change_password,
        auth::revoke_sessions,
        org::create_organization,
        org::update_organization,
        org::delete_organization,
        org::list_organizations,
        org::get_full_organization,
        org::set_active_organization,
        org::invite_member,
        org::accept_invitation,
        org::reject_invitation,
        org::cancel_invitation,
        org::remove_member,
        org::update_member_role,
        org::list_members,
        org::check_slug,
    ),
    components(
        schemas(
            User, LinkedIdentity, Session, SessionWithUser,
            Organization, Member, MemberUser, MemberWithUser, Invitation, InvitationStatus,
            auth::SignUpEmailRequest, auth::SignInEmailRequest, auth::SocialSignInRequest,
            auth::SessionTokenResponse, auth::SignInResponse, auth::SocialSignInResponse,
            auth::ChangePasswordRequest, auth::ChangePasswordResponse,
            organization::OrganizationWithMembers, organization::FullOrganization,
            org::CreateOrganizationRequest, org::UpdateOrganizationRequest,
            org::UpdateOrganizationData, org::DeleteOrganizationRequest,
            org::SetActiveOrganizationRequest, org::InviteMemberRequest,
            org::InvitationIdRequest, org::RemoveMemberRequest, org::UpdateMemberRoleRequest,
            org::CheckSlugRequest, org::CheckSlugResponse, org::InvitationResponse,
            org::MemberResponse, org::RemovedMemberResponse, org::ListMembersResponse,
        )
    ),
    tags(
        (name = "auth", description = "Email, anonymous and social sign-in; sessions"),
        (name = "organization", description = "Organizations, members and invitations")
    ),
    info(
        title = "Sophia Auth API",
        description = "Better Auth-compatible authentication endpoints",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct AuthApiDoc;

impl AuthApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}

/// GET /api/auth/open-api/generate-schema
pub async fn generate_schema() -> Json<utoipa::openapi::OpenApi> {
    Json(AuthApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_auth_and_organization_paths() {
        let json: serde_json::Value =
            serde_json::from_str(&AuthApiDoc::to_json().unwrap()).unwrap();
        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/auth/sign-up/email"));
        assert!(paths.contains_key("/api/auth/get-session"));
        assert!(paths.contains_key("/api/auth/change-password"));
        assert!(paths.contains_key("/api/auth/organization/create"));
        assert!(paths.contains_key("/api/auth/organization/check-slug"));
        assert!(json["components"]["schemas"]
            .as_object()
            .unwrap()
            .contains_key("SessionWithUser"));
    }
}
