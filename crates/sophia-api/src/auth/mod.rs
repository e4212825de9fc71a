// Authentication module
// Decision: Better Auth-compatible email/password, anonymous, Google OAuth and organizations
// Decision: Sessions are opaque tokens in the database, carried by a signed cookie

pub mod cookie_rewrite;
pub mod middleware;
pub mod oauth;
pub mod organization;
pub mod routes;
pub mod session;

pub use middleware::AuthError;
pub use routes::routes;
pub use session::{AuthService, ClientMeta, ResolvedSession, SESSION_COOKIE_NAME};
