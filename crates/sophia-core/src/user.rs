// User domain types
//
// Serialized in the shape auth clients expect from `/api/auth/*` responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A registered (or anonymous) user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier for the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address, unique across users.
    pub email: String,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// Avatar URL.
    pub image: Option<String>,
    /// Whether the user was created through anonymous sign-in.
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A provider linked to a user (email/password or OAuth).
/// Never carries credentials or tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LinkedIdentity {
    pub id: Uuid,
    /// Provider identifier, e.g. `email` or `google`.
    pub provider_id: String,
    /// Account identifier at the provider (email for `email`, subject for OAuth).
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_camel_case() {
        let now = Utc::now();
        let user = User {
            id: Uuid::nil(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            email_verified: true,
            image: None,
            is_anonymous: false,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["emailVerified"], true);
        assert_eq!(json["isAnonymous"], false);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("email_verified").is_none());
    }

    #[test]
    fn test_linked_identity_omits_missing_scope() {
        let identity = LinkedIdentity {
            id: Uuid::nil(),
            provider_id: "email".to_string(),
            account_id: "test@example.com".to_string(),
            scope: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["providerId"], "email");
        assert!(json.get("scope").is_none());
    }
}
