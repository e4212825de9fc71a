// Repository layer for database operations (PostgreSQL)
// Decision: Runtime-checked queries (query_as) so builds do not need a live database

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;

const USER_COLUMNS: &str =
    "id, name, email, email_verified, image, is_anonymous, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, token, user_id, expires_at, ip_address, user_agent, active_organization_id, created_at, updated_at";
const IDENTITY_COLUMNS: &str = "id, account_id, provider_id, user_id, access_token, refresh_token, id_token, access_token_expires_at, refresh_token_expires_at, scope, password, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO "user" (id, name, email, email_verified, image, is_anonymous)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.email_verified)
        .bind(&input.image)
        .bind(input.is_anonymous)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE LOWER(email) = LOWER($1)"#
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE "user"
            SET
                name = COALESCE($2, name),
                image = COALESCE($3, image),
                email_verified = COALESCE($4, email_verified),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.image)
        .bind(input.email_verified)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Identities, sessions, memberships and sent invitations cascade.
    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Identities
    // ============================================

    pub async fn create_identity(&self, input: CreateIdentityRow) -> Result<IdentityRow> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            INSERT INTO identity (
                id, account_id, provider_id, user_id, access_token, refresh_token, id_token,
                access_token_expires_at, refresh_token_expires_at, scope, password
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {IDENTITY_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.account_id)
        .bind(&input.provider_id)
        .bind(input.user_id)
        .bind(&input.access_token)
        .bind(&input.refresh_token)
        .bind(&input.id_token)
        .bind(input.access_token_expires_at)
        .bind(input.refresh_token_expires_at)
        .bind(&input.scope)
        .bind(&input.password)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_identity_by_provider(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<IdentityRow>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"SELECT {IDENTITY_COLUMNS} FROM identity WHERE provider_id = $1 AND account_id = $2"#
        ))
        .bind(provider_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_identities_for_user(&self, user_id: Uuid) -> Result<Vec<IdentityRow>> {
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"SELECT {IDENTITY_COLUMNS} FROM identity WHERE user_id = $1 ORDER BY created_at ASC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_identity_tokens(
        &self,
        id: Uuid,
        input: UpdateIdentityTokens,
    ) -> Result<Option<IdentityRow>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            UPDATE identity
            SET
                access_token = COALESCE($2, access_token),
                refresh_token = COALESCE($3, refresh_token),
                id_token = COALESCE($4, id_token),
                access_token_expires_at = COALESCE($5, access_token_expires_at),
                scope = COALESCE($6, scope),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.access_token)
        .bind(&input.refresh_token)
        .bind(&input.id_token)
        .bind(input.access_token_expires_at)
        .bind(&input.scope)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_identity_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result =
            sqlx::query(r#"UPDATE identity SET password = $2, updated_at = NOW() WHERE id = $1"#)
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Sessions
    // ============================================

    pub async fn create_session(&self, input: CreateSessionRow) -> Result<SessionRow> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO session (id, token, user_id, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.token)
        .bind(input.user_id)
        .bind(input.expires_at)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"SELECT {SESSION_COLUMNS} FROM session WHERE token = $1"#
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Move the expiry of a session forward
    pub async fn touch_session(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE session SET expires_at = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_active_organization(
        &self,
        session_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE session SET active_organization_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_session_by_token(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM session WHERE token = $1"#)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM session WHERE expires_at <= NOW()"#)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM session WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ============================================
    // Verifications
    // ============================================

    pub async fn create_verification(
        &self,
        input: CreateVerificationRow,
    ) -> Result<VerificationRow> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r#"
            INSERT INTO verification (id, identifier, value, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, identifier, value, expires_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.identifier)
        .bind(&input.value)
        .bind(input.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent verification for an identifier
    pub async fn get_verification(&self, identifier: &str) -> Result<Option<VerificationRow>> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r#"
            SELECT id, identifier, value, expires_at, created_at, updated_at
            FROM verification
            WHERE identifier = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_verification(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM verification WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Organizations
    // ============================================

    pub async fn create_organization(
        &self,
        input: CreateOrganizationRow,
    ) -> Result<OrganizationRow> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            INSERT INTO organization (id, name, slug, logo, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, slug, logo, metadata, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.logo)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"SELECT id, name, slug, logo, metadata, created_at FROM organization WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_organization_by_slug(&self, slug: &str) -> Result<Option<OrganizationRow>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"SELECT id, name, slug, logo, metadata, created_at FROM organization WHERE slug = $1"#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_organizations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationRow>> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT o.id, o.name, o.slug, o.logo, o.metadata, o.created_at
            FROM organization o
            JOIN member m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY o.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_organization(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> Result<Option<OrganizationRow>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            UPDATE organization
            SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                logo = COALESCE($4, logo),
                metadata = COALESCE($5, metadata)
            WHERE id = $1
            RETURNING id, name, slug, logo, metadata, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.logo)
        .bind(&input.metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Delete an organization; members and invitations cascade,
    /// sessions pointing at it lose their active organization
    pub async fn delete_organization(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM organization WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Members
    // ============================================

    pub async fn create_member(&self, input: CreateMemberRow) -> Result<MemberRow> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO member (id, organization_id, user_id, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, organization_id, user_id, role, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.organization_id)
        .bind(input.user_id)
        .bind(&input.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Membership of a user in an organization
    pub async fn get_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRow>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, organization_id, user_id, role, created_at
            FROM member
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_member_by_id(&self, id: Uuid) -> Result<Option<MemberRow>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"SELECT id, organization_id, user_id, role, created_at FROM member WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, organization_id, user_id, role, created_at
            FROM member
            WHERE organization_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_memberships_for_user(&self, user_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM member WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn update_member_role(&self, id: Uuid, role: &str) -> Result<Option<MemberRow>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE member SET role = $2
            WHERE id = $1
            RETURNING id, organization_id, user_id, role, created_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_member(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM member WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Invitations
    // ============================================

    pub async fn create_invitation(&self, input: CreateInvitationRow) -> Result<InvitationRow> {
        let row = sqlx::query_as::<_, InvitationRow>(
            r#"
            INSERT INTO invitation (id, organization_id, email, role, status, expires_at, inviter_id)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id, organization_id, email, role, status, expires_at, inviter_id, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.organization_id)
        .bind(&input.email)
        .bind(&input.role)
        .bind(input.expires_at)
        .bind(input.inviter_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_invitation(&self, id: Uuid) -> Result<Option<InvitationRow>> {
        let row = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT id, organization_id, email, role, status, expires_at, inviter_id, created_at
            FROM invitation
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_invitations(&self, organization_id: Uuid) -> Result<Vec<InvitationRow>> {
        let rows = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT id, organization_id, email, role, status, expires_at, inviter_id, created_at
            FROM invitation
            WHERE organization_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_invitation_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<Option<InvitationRow>> {
        let row = sqlx::query_as::<_, InvitationRow>(
            r#"
            UPDATE invitation SET status = $2
            WHERE id = $1
            RETURNING id, organization_id, email, role, status, expires_at, inviter_id, created_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
