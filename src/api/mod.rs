mod admin;
mod error;
mod members;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::auth::{TokenService, authentication_gate};
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};

/// Create the API router.
///
/// Every route passes through the authentication gate; handlers opt into
/// requiring a principal with the `Auth` extractor.
pub fn create_api_router(
    db: Database,
    service: TokenService,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let codec = Arc::new(service.issuer().codec().clone());

    let members_state = members::MembersState {
        service,
        secure_cookies,
        rate_limit_config,
    };

    let admin_state = admin::AdminState { db };

    Router::new()
        .nest("/members", members::router(members_state))
        .nest("/admin", admin::router(admin_state))
        .layer(middleware::from_fn_with_state(codec, authentication_gate))
}
