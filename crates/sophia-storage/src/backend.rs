// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// A unified StorageBackend over PostgreSQL (production) or in-memory (dev mode)
// storage. Every operation has the same semantics on both variants.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::memory::InMemoryDatabase;
use super::models::*;
use super::repositories::Database;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl StorageBackend {
    /// Connect to PostgreSQL and apply migrations
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        db.migrate().await?;
        tracing::info!("Database migrations applied");
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    /// Backend name for health and info responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::InMemory(_) => "memory",
        }
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        match self {
            Self::Postgres(db) => db.create_user(input).await,
            Self::InMemory(db) => db.create_user(input).await,
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user(id).await,
            Self::InMemory(db) => db.get_user(id).await,
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user_by_email(email).await,
            Self::InMemory(db) => db.get_user_by_email(email).await,
        }
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.update_user(id, input).await,
            Self::InMemory(db) => db.update_user(id, input).await,
        }
    }

    /// Delete a user together with their identities, sessions and memberships
    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_user(id).await,
            Self::InMemory(db) => db.delete_user(id).await,
        }
    }

    // ============================================
    // Identities
    // ============================================

    pub async fn create_identity(&self, input: CreateIdentityRow) -> Result<IdentityRow> {
        match self {
            Self::Postgres(db) => db.create_identity(input).await,
            Self::InMemory(db) => db.create_identity(input).await,
        }
    }

    pub async fn get_identity_by_provider(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<IdentityRow>> {
        match self {
            Self::Postgres(db) => db.get_identity_by_provider(provider_id, account_id).await,
            Self::InMemory(db) => db.get_identity_by_provider(provider_id, account_id).await,
        }
    }

    pub async fn list_identities_for_user(&self, user_id: Uuid) -> Result<Vec<IdentityRow>> {
        match self {
            Self::Postgres(db) => db.list_identities_for_user(user_id).await,
            Self::InMemory(db) => db.list_identities_for_user(user_id).await,
        }
    }

    pub async fn update_identity_tokens(
        &self,
        id: Uuid,
        input: UpdateIdentityTokens,
    ) -> Result<Option<IdentityRow>> {
        match self {
            Self::Postgres(db) => db.update_identity_tokens(id, input).await,
            Self::InMemory(db) => db.update_identity_tokens(id, input).await,
        }
    }

    pub async fn update_identity_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.update_identity_password(id, password_hash).await,
            Self::InMemory(db) => db.update_identity_password(id, password_hash).await,
        }
    }

    // ============================================
    // Sessions
    // ============================================

    pub async fn create_session(&self, input: CreateSessionRow) -> Result<SessionRow> {
        match self {
            Self::Postgres(db) => db.create_session(input).await,
            Self::InMemory(db) => db.create_session(input).await,
        }
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<SessionRow>> {
        match self {
            Self::Postgres(db) => db.get_session_by_token(token).await,
            Self::InMemory(db) => db.get_session_by_token(token).await,
        }
    }

    pub async fn touch_session(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<SessionRow>> {
        match self {
            Self::Postgres(db) => db.touch_session(id, expires_at).await,
            Self::InMemory(db) => db.touch_session(id, expires_at).await,
        }
    }

    pub async fn set_active_organization(
        &self,
        session_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<SessionRow>> {
        match self {
            Self::Postgres(db) => db.set_active_organization(session_id, organization_id).await,
            Self::InMemory(db) => db.set_active_organization(session_id, organization_id).await,
        }
    }

    pub async fn delete_session_by_token(&self, token: &str) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_session_by_token(token).await,
            Self::InMemory(db) => db.delete_session_by_token(token).await,
        }
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        match self {
            Self::Postgres(db) => db.delete_expired_sessions().await,
            Self::InMemory(db) => db.delete_expired_sessions().await,
        }
    }

    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        match self {
            Self::Postgres(db) => db.delete_sessions_for_user(user_id).await,
            Self::InMemory(db) => db.delete_sessions_for_user(user_id).await,
        }
    }

    // ============================================
    // Verifications
    // ============================================

    pub async fn create_verification(
        &self,
        input: CreateVerificationRow,
    ) -> Result<VerificationRow> {
        match self {
            Self::Postgres(db) => db.create_verification(input).await,
            Self::InMemory(db) => db.create_verification(input).await,
        }
    }

    pub async fn get_verification(&self, identifier: &str) -> Result<Option<VerificationRow>> {
        match self {
            Self::Postgres(db) => db.get_verification(identifier).await,
            Self::InMemory(db) => db.get_verification(identifier).await,
        }
    }

    pub async fn delete_verification(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_verification(id).await,
            Self::InMemory(db) => db.delete_verification(id).await,
        }
    }

    // ============================================
    // Organizations
    // ============================================

    pub async fn create_organization(
        &self,
        input: CreateOrganizationRow,
    ) -> Result<OrganizationRow> {
        match self {
            Self::Postgres(db) => db.create_organization(input).await,
            Self::InMemory(db) => db.create_organization(input).await,
        }
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        match self {
            Self::Postgres(db) => db.get_organization(id).await,
            Self::InMemory(db) => db.get_organization(id).await,
        }
    }

    pub async fn get_organization_by_slug(&self, slug: &str) -> Result<Option<OrganizationRow>> {
        match self {
            Self::Postgres(db) => db.get_organization_by_slug(slug).await,
            Self::InMemory(db) => db.get_organization_by_slug(slug).await,
        }
    }

    pub async fn list_organizations_for_user(&self, user_id: Uuid) -> Result<Vec<OrganizationRow>> {
        match self {
            Self::Postgres(db) => db.list_organizations_for_user(user_id).await,
            Self::InMemory(db) => db.list_organizations_for_user(user_id).await,
        }
    }

    pub async fn update_organization(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> Result<Option<OrganizationRow>> {
        match self {
            Self::Postgres(db) => db.update_organization(id, input).await,
            Self::InMemory(db) => db.update_organization(id, input).await,
        }
    }

    pub async fn delete_organization(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_organization(id).await,
            Self::InMemory(db) => db.delete_organization(id).await,
        }
    }

    // ============================================
    // Members
    // ============================================

    pub async fn create_member(&self, input: CreateMemberRow) -> Result<MemberRow> {
        match self {
            Self::Postgres(db) => db.create_member(input).await,
            Self::InMemory(db) => db.create_member(input).await,
        }
    }

    pub async fn get_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRow>> {
        match self {
            Self::Postgres(db) => db.get_member(organization_id, user_id).await,
            Self::InMemory(db) => db.get_member(organization_id, user_id).await,
        }
    }

    pub async fn get_member_by_id(&self, id: Uuid) -> Result<Option<MemberRow>> {
        match self {
            Self::Postgres(db) => db.get_member_by_id(id).await,
            Self::InMemory(db) => db.get_member_by_id(id).await,
        }
    }

    pub async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>> {
        match self {
            Self::Postgres(db) => db.list_members(organization_id).await,
            Self::InMemory(db) => db.list_members(organization_id).await,
        }
    }

    pub async fn count_memberships_for_user(&self, user_id: Uuid) -> Result<i64> {
        match self {
            Self::Postgres(db) => db.count_memberships_for_user(user_id).await,
            Self::InMemory(db) => db.count_memberships_for_user(user_id).await,
        }
    }

    pub async fn update_member_role(&self, id: Uuid, role: &str) -> Result<Option<MemberRow>> {
        match self {
            Self::Postgres(db) => db.update_member_role(id, role).await,
            Self::InMemory(db) => db.update_member_role(id, role).await,
        }
    }

    pub async fn delete_member(&self, id: Uuid) -> Result<bool> {
        match self {
            Self::Postgres(db) => db.delete_member(id).await,
            Self::InMemory(db) => db.delete_member(id).await,
        }
    }

    // ============================================
    // Invitations
    // ============================================

    pub async fn create_invitation(&self, input: CreateInvitationRow) -> Result<InvitationRow> {
        match self {
            Self::Postgres(db) => db.create_invitation(input).await,
            Self::InMemory(db) => db.create_invitation(input).await,
        }
    }

    pub async fn get_invitation(&self, id: Uuid) -> Result<Option<InvitationRow>> {
        match self {
            Self::Postgres(db) => db.get_invitation(id).await,
            Self::InMemory(db) => db.get_invitation(id).await,
        }
    }

    pub async fn list_invitations(&self, organization_id: Uuid) -> Result<Vec<InvitationRow>> {
        match self {
            Self::Postgres(db) => db.list_invitations(organization_id).await,
            Self::InMemory(db) => db.list_invitations(organization_id).await,
        }
    }

    pub async fn update_invitation_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<Option<InvitationRow>> {
        match self {
            Self::Postgres(db) => db.update_invitation_status(id, status).await,
            Self::InMemory(db) => db.update_invitation_status(id, status).await,
        }
    }
}
