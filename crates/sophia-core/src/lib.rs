// Sophia core
//
// DB-agnostic domain types shared by the storage layer and the API:
// - users and linked identities (the renamed Better Auth "account" model)
// - auth sessions
// - organizations, members and invitations (organization plugin)
//
// Telemetry initialization lives here so every binary logs the same way.

pub mod organization;
pub mod session;
pub mod telemetry;
pub mod user;

pub use organization::{
    Invitation, InvitationStatus, Member, MemberUser, MemberWithUser, Organization,
};
pub use session::{Session, SessionWithUser};
pub use user::{LinkedIdentity, User};
