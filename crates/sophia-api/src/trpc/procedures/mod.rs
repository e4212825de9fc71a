// Application router: { user, organization }

pub mod organization;
pub mod user;

use super::router::TrpcRouter;

pub fn app_router() -> TrpcRouter {
    TrpcRouter::new()
        .merge("user", user::router())
        .merge("organization", organization::router())
}
