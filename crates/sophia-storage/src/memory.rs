// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Mirrors the PostgreSQL repository, including its unique constraints and
// cascades, so the API can run (and be tested) without a database.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::error::StorageError;
use super::models::*;

/// In-memory database for dev mode
/// All data is stored in memory and lost on restart
#[derive(Default)]
pub struct InMemoryDatabase {
    users: RwLock<HashMap<Uuid, UserRow>>,
    identities: RwLock<HashMap<Uuid, IdentityRow>>,
    sessions: RwLock<HashMap<Uuid, SessionRow>>,
    verifications: RwLock<HashMap<Uuid, VerificationRow>>,
    organizations: RwLock<HashMap<Uuid, OrganizationRow>>,
    members: RwLock<HashMap<Uuid, MemberRow>>,
    invitations: RwLock<HashMap<Uuid, InvitationRow>>,
}

fn sorted_by_created<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    rows.sort_by_key(|r| key(r));
    rows
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&input.email))
        {
            return Err(StorageError::Conflict(format!(
                "User with email {} already exists",
                input.email
            ))
            .into());
        }

        let now = Self::now();
        let id = Uuid::now_v7();
        let row = UserRow {
            id,
            name: input.name,
            email: input.email,
            email_verified: input.email_verified,
            image: input.image,
            is_anonymous: input.is_anonymous,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        Ok(self.users.read().get(&id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(image) = input.image {
            user.image = Some(image);
        }
        if let Some(verified) = input.email_verified {
            user.email_verified = verified;
        }
        user.updated_at = Self::now();
        Ok(Some(user.clone()))
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        if self.users.write().remove(&id).is_none() {
            return Ok(false);
        }

        self.identities.write().retain(|_, i| i.user_id != id);
        self.sessions.write().retain(|_, s| s.user_id != id);
        self.members.write().retain(|_, m| m.user_id != id);
        self.invitations.write().retain(|_, i| i.inviter_id != id);
        Ok(true)
    }

    // ============================================
    // Identities
    // ============================================

    pub async fn create_identity(&self, input: CreateIdentityRow) -> Result<IdentityRow> {
        let mut identities = self.identities.write();
        if identities
            .values()
            .any(|i| i.provider_id == input.provider_id && i.account_id == input.account_id)
        {
            return Err(StorageError::Conflict(format!(
                "Identity {}:{} already exists",
                input.provider_id, input.account_id
            ))
            .into());
        }

        let now = Self::now();
        let id = Uuid::now_v7();
        let row = IdentityRow {
            id,
            account_id: input.account_id,
            provider_id: input.provider_id,
            user_id: input.user_id,
            access_token: input.access_token,
            refresh_token: input.refresh_token,
            id_token: input.id_token,
            access_token_expires_at: input.access_token_expires_at,
            refresh_token_expires_at: input.refresh_token_expires_at,
            scope: input.scope,
            password: input.password,
            created_at: now,
            updated_at: now,
        };
        identities.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_identity_by_provider(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<IdentityRow>> {
        Ok(self
            .identities
            .read()
            .values()
            .find(|i| i.provider_id == provider_id && i.account_id == account_id)
            .cloned())
    }

    pub async fn list_identities_for_user(&self, user_id: Uuid) -> Result<Vec<IdentityRow>> {
        let rows = self
            .identities
            .read()
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(rows, |i: &IdentityRow| (i.created_at, i.id)))
    }

    pub async fn update_identity_tokens(
        &self,
        id: Uuid,
        input: UpdateIdentityTokens,
    ) -> Result<Option<IdentityRow>> {
        let mut identities = self.identities.write();
        let Some(identity) = identities.get_mut(&id) else {
            return Ok(None);
        };

        if input.access_token.is_some() {
            identity.access_token = input.access_token;
        }
        if input.refresh_token.is_some() {
            identity.refresh_token = input.refresh_token;
        }
        if input.id_token.is_some() {
            identity.id_token = input.id_token;
        }
        if input.access_token_expires_at.is_some() {
            identity.access_token_expires_at = input.access_token_expires_at;
        }
        if input.scope.is_some() {
            identity.scope = input.scope;
        }
        identity.updated_at = Self::now();
        Ok(Some(identity.clone()))
    }

    pub async fn update_identity_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut identities = self.identities.write();
        let Some(identity) = identities.get_mut(&id) else {
            return Ok(false);
        };
        identity.password = Some(password_hash.to_string());
        identity.updated_at = Self::now();
        Ok(true)
    }

    // ============================================
    // Sessions
    // ============================================

    pub async fn create_session(&self, input: CreateSessionRow) -> Result<SessionRow> {
        let mut sessions = self.sessions.write();
        if sessions.values().any(|s| s.token == input.token) {
            return Err(StorageError::Conflict("Session token collision".to_string()).into());
        }

        let now = Self::now();
        let id = Uuid::now_v7();
        let row = SessionRow {
            id,
            token: input.token,
            user_id: input.user_id,
            expires_at: input.expires_at,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            active_organization_id: None,
            created_at: now,
            updated_at: now,
        };
        sessions.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<SessionRow>> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    pub async fn touch_session(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<SessionRow>> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&id) else {
            return Ok(None);
        };
        session.expires_at = expires_at;
        session.updated_at = Self::now();
        Ok(Some(session.clone()))
    }

    pub async fn set_active_organization(
        &self,
        session_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<SessionRow>> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        session.active_organization_id = organization_id;
        session.updated_at = Self::now();
        Ok(Some(session.clone()))
    }

    pub async fn delete_session_by_token(&self, token: &str) -> Result<bool> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.token != token);
        Ok(sessions.len() < before)
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        let now = Self::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }

    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    // ============================================
    // Verifications
    // ============================================

    pub async fn create_verification(
        &self,
        input: CreateVerificationRow,
    ) -> Result<VerificationRow> {
        let now = Self::now();
        let id = Uuid::now_v7();
        let row = VerificationRow {
            id,
            identifier: input.identifier,
            value: input.value,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.verifications.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_verification(&self, identifier: &str) -> Result<Option<VerificationRow>> {
        Ok(self
            .verifications
            .read()
            .values()
            .filter(|v| v.identifier == identifier)
            .max_by_key(|v| (v.created_at, v.id))
            .cloned())
    }

    pub async fn delete_verification(&self, id: Uuid) -> Result<bool> {
        Ok(self.verifications.write().remove(&id).is_some())
    }

    // ============================================
    // Organizations
    // ============================================

    pub async fn create_organization(
        &self,
        input: CreateOrganizationRow,
    ) -> Result<OrganizationRow> {
        let mut organizations = self.organizations.write();
        if organizations.values().any(|o| o.slug == input.slug) {
            return Err(StorageError::Conflict(format!(
                "Organization slug {} already exists",
                input.slug
            ))
            .into());
        }

        let id = Uuid::now_v7();
        let row = OrganizationRow {
            id,
            name: input.name,
            slug: input.slug,
            logo: input.logo,
            metadata: input.metadata,
            created_at: Self::now(),
        };
        organizations.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        Ok(self.organizations.read().get(&id).cloned())
    }

    pub async fn get_organization_by_slug(&self, slug: &str) -> Result<Option<OrganizationRow>> {
        Ok(self
            .organizations
            .read()
            .values()
            .find(|o| o.slug == slug)
            .cloned())
    }

    pub async fn list_organizations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationRow>> {
        let org_ids: Vec<Uuid> = self
            .members
            .read()
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.organization_id)
            .collect();

        let organizations = self.organizations.read();
        let rows = org_ids
            .iter()
            .filter_map(|id| organizations.get(id).cloned())
            .collect();
        Ok(sorted_by_created(rows, |o: &OrganizationRow| {
            (o.created_at, o.id)
        }))
    }

    pub async fn update_organization(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> Result<Option<OrganizationRow>> {
        let mut organizations = self.organizations.write();
        if let Some(slug) = &input.slug {
            if organizations
                .values()
                .any(|o| o.id != id && &o.slug == slug)
            {
                return Err(StorageError::Conflict(format!(
                    "Organization slug {} already exists",
                    slug
                ))
                .into());
            }
        }

        let Some(org) = organizations.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = input.name {
            org.name = name;
        }
        if let Some(slug) = input.slug {
            org.slug = slug;
        }
        if let Some(logo) = input.logo {
            org.logo = Some(logo);
        }
        if let Some(metadata) = input.metadata {
            org.metadata = Some(metadata);
        }
        Ok(Some(org.clone()))
    }

    pub async fn delete_organization(&self, id: Uuid) -> Result<bool> {
        if self.organizations.write().remove(&id).is_none() {
            return Ok(false);
        }

        self.members.write().retain(|_, m| m.organization_id != id);
        self.invitations
            .write()
            .retain(|_, i| i.organization_id != id);
        for session in self.sessions.write().values_mut() {
            if session.active_organization_id == Some(id) {
                session.active_organization_id = None;
            }
        }
        Ok(true)
    }

    // ============================================
    // Members
    // ============================================

    pub async fn create_member(&self, input: CreateMemberRow) -> Result<MemberRow> {
        let mut members = self.members.write();
        if members
            .values()
            .any(|m| m.organization_id == input.organization_id && m.user_id == input.user_id)
        {
            return Err(StorageError::Conflict(
                "User is already a member of this organization".to_string(),
            )
            .into());
        }

        let id = Uuid::now_v7();
        let row = MemberRow {
            id,
            organization_id: input.organization_id,
            user_id: input.user_id,
            role: input.role,
            created_at: Self::now(),
        };
        members.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRow>> {
        Ok(self
            .members
            .read()
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    pub async fn get_member_by_id(&self, id: Uuid) -> Result<Option<MemberRow>> {
        Ok(self.members.read().get(&id).cloned())
    }

    pub async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>> {
        let rows = self
            .members
            .read()
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(rows, |m: &MemberRow| (m.created_at, m.id)))
    }

    pub async fn count_memberships_for_user(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .members
            .read()
            .values()
            .filter(|m| m.user_id == user_id)
            .count() as i64)
    }

    pub async fn update_member_role(&self, id: Uuid, role: &str) -> Result<Option<MemberRow>> {
        let mut members = self.members.write();
        let Some(member) = members.get_mut(&id) else {
            return Ok(None);
        };
        member.role = role.to_string();
        Ok(Some(member.clone()))
    }

    pub async fn delete_member(&self, id: Uuid) -> Result<bool> {
        Ok(self.members.write().remove(&id).is_some())
    }

    // ============================================
    // Invitations
    // ============================================

    pub async fn create_invitation(&self, input: CreateInvitationRow) -> Result<InvitationRow> {
        let id = Uuid::now_v7();
        let row = InvitationRow {
            id,
            organization_id: input.organization_id,
            email: input.email,
            role: input.role,
            status: "pending".to_string(),
            expires_at: input.expires_at,
            inviter_id: input.inviter_id,
            created_at: Self::now(),
        };
        self.invitations.write().insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_invitation(&self, id: Uuid) -> Result<Option<InvitationRow>> {
        Ok(self.invitations.read().get(&id).cloned())
    }

    pub async fn list_invitations(&self, organization_id: Uuid) -> Result<Vec<InvitationRow>> {
        let rows = self
            .invitations
            .read()
            .values()
            .filter(|i| i.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(rows, |i: &InvitationRow| {
            (i.created_at, i.id)
        }))
    }

    pub async fn update_invitation_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<Option<InvitationRow>> {
        let mut invitations = self.invitations.write();
        let Some(invitation) = invitations.get_mut(&id) else {
            return Ok(None);
        };
        invitation.status = status.to_string();
        Ok(Some(invitation.clone()))
    }
}
