//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::{debug, info};

use crate::auth::{ClientIpHeader, extract_client_ip};

/// Default login attempts allowed per minute per client.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Bucket shared by clients whose address cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: Arc<IpLimiter>,
    /// Trusted proxy header; `None` keys on the socket address
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    /// Allow `login_per_minute` login attempts per client, bursting up to the same amount.
    /// Zero is treated as one.
    pub fn new(login_per_minute: u32, ip_header: Option<ClientIpHeader>) -> Self {
        let per_minute = NonZeroU32::new(login_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_header,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PER_MINUTE, None)
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(request.headers(), request.extensions(), config.ip_header)
        .unwrap_or_else(|reason| {
            debug!(reason, "Client IP unavailable, using shared bucket");
            UNKNOWN_CLIENT.to_string()
        });

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            info!(client = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "code": "TOO_MANY_REQUESTS",
                    "message": "Too many login attempts. Please wait before trying again.",
                })),
            )
                .into_response()
        }
    }
}
