// Storage layer for Sophia
// Decision: Support both PostgreSQL (production) and in-memory (dev mode)
//
// Tables follow the Better Auth schema convention, with the "account" model
// renamed to "identity":
// - user, session, identity, verification (auth core)
// - organization, member, invitation (organization plugin)

pub mod backend;
pub mod error;
pub mod memory;
pub mod models;
pub mod password;
pub mod repositories;

pub use backend::StorageBackend;
pub use error::{is_conflict, StorageError};
pub use memory::InMemoryDatabase;
pub use models::*;
pub use repositories::Database;
