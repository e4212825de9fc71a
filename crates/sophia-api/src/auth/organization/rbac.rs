// Organization role permissions
// Decision: Only the three built-in roles (owner, admin, member); no custom roles

/// Resource types for permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Organization,
    Member,
    Invitation,
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Cancel,
}

pub const OWNER: &str = "owner";
pub const ADMIN: &str = "admin";
pub const MEMBER: &str = "member";

fn role_permissions(role: &str, resource: Resource) -> &'static [Action] {
    match (role, resource) {
        (OWNER, Resource::Organization) => &[Action::Update, Action::Delete],
        (ADMIN, Resource::Organization) => &[Action::Update],
        (OWNER | ADMIN, Resource::Member) => &[Action::Create, Action::Update, Action::Delete],
        (OWNER | ADMIN, Resource::Invitation) => &[Action::Create, Action::Cancel],
        _ => &[],
    }
}

fn roles(roles_str: &str) -> impl Iterator<Item = &str> {
    roles_str.split(',').map(str::trim).filter(|r| !r.is_empty())
}

/// Check if a single role has permission for an action on a resource
pub fn has_permission(role: &str, resource: Resource, action: Action) -> bool {
    role_permissions(role, resource).contains(&action)
}

/// Handle composite roles (comma-separated)
pub fn has_permission_any(roles_str: &str, resource: Resource, action: Action) -> bool {
    roles(roles_str).any(|role| has_permission(role, resource, action))
}

pub fn is_owner(roles_str: &str) -> bool {
    roles(roles_str).any(|role| role == OWNER)
}

/// Every part of a (possibly composite) role is a known role
pub fn is_valid_role(roles_str: &str) -> bool {
    let mut parts = roles(roles_str).peekable();
    parts.peek().is_some() && parts.all(|role| matches!(role, OWNER | ADMIN | MEMBER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_has_full_permissions() {
        assert!(has_permission(OWNER, Resource::Organization, Action::Update));
        assert!(has_permission(OWNER, Resource::Organization, Action::Delete));
        assert!(has_permission(OWNER, Resource::Member, Action::Create));
        assert!(has_permission(OWNER, Resource::Invitation, Action::Cancel));
    }

    #[test]
    fn test_admin_cannot_delete_organization() {
        assert!(has_permission(ADMIN, Resource::Organization, Action::Update));
        assert!(!has_permission(ADMIN, Resource::Organization, Action::Delete));
        assert!(has_permission(ADMIN, Resource::Member, Action::Delete));
    }

    #[test]
    fn test_member_has_no_permissions() {
        assert!(!has_permission(MEMBER, Resource::Organization, Action::Update));
        assert!(!has_permission(MEMBER, Resource::Member, Action::Create));
        assert!(!has_permission(MEMBER, Resource::Invitation, Action::Create));
    }

    #[test]
    fn test_composite_roles() {
        assert!(has_permission_any(
            "member, admin",
            Resource::Organization,
            Action::Update
        ));
        assert!(!has_permission_any("member", Resource::Organization, Action::Update));
        assert!(is_owner("admin,owner"));
        assert!(!is_owner("admin"));
    }

    #[test]
    fn test_role_validation() {
        assert!(is_valid_role("member"));
        assert!(is_valid_role("admin,member"));
        assert!(!is_valid_role("superuser"));
        assert!(!is_valid_role("admin,root"));
        assert!(!is_valid_role(" , "));
    }
}
