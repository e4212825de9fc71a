// Organization plugin: tenants, memberships and invitations
// Decision: Any user may create organizations, up to ORGANIZATION_LIMIT memberships
// Decision: The creator becomes "owner"; invitations are open for 48 hours

pub mod rbac;
pub mod routes;

use anyhow::Result;
use serde::Serialize;
use sophia_core::{Invitation, MemberUser, MemberWithUser, Organization};
use sophia_storage::{MemberRow, StorageBackend};
use utoipa::ToSchema;
use uuid::Uuid;

pub use routes::routes;

pub const ORGANIZATION_LIMIT: i64 = 5;
pub const CREATOR_ROLE: &str = rbac::OWNER;
pub const INVITATION_TTL_HOURS: i64 = 48;

/// Organization with its members
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationWithMembers {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<MemberWithUser>,
}

/// Organization with members and invitations
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FullOrganization {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<MemberWithUser>,
    pub invitations: Vec<Invitation>,
}

/// Attach user details to a membership row
pub async fn member_with_user(
    storage: &StorageBackend,
    member: MemberRow,
) -> Result<Option<MemberWithUser>> {
    let Some(user) = storage.get_user(member.user_id).await? else {
        return Ok(None);
    };
    Ok(Some(MemberWithUser {
        member: member.into(),
        user: MemberUser::from(&sophia_core::User::from(user)),
    }))
}

/// Members of an organization with user details, oldest first
pub async fn members_with_users(
    storage: &StorageBackend,
    organization_id: Uuid,
) -> Result<Vec<MemberWithUser>> {
    let rows = storage.list_members(organization_id).await?;
    let mut members = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(member) = member_with_user(storage, row).await? {
            members.push(member);
        }
    }
    Ok(members)
}

pub async fn organization_with_members(
    storage: &StorageBackend,
    organization: Organization,
) -> Result<OrganizationWithMembers> {
    let members = members_with_users(storage, organization.id).await?;
    Ok(OrganizationWithMembers {
        organization,
        members,
    })
}

pub async fn full_organization(
    storage: &StorageBackend,
    organization: Organization,
) -> Result<FullOrganization> {
    let members = members_with_users(storage, organization.id).await?;
    let invitations = storage
        .list_invitations(organization.id)
        .await?
        .into_iter()
        .map(Invitation::from)
        .collect();
    Ok(FullOrganization {
        organization,
        members,
        invitations,
    })
}

/// Number of members holding the owner role
pub fn owner_count(members: &[MemberRow]) -> usize {
    members.iter().filter(|m| rbac::is_owner(&m.role)).count()
}
