//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (stateless, sent as a bearer
//! header) and long-lived refresh tokens (one database record per member,
//! sent as an HttpOnly cookie). A refresh token is exchanged for a new pair
//! exactly once; every reissue rotates the stored record.

mod cookie;
mod errors;
mod extractors;
mod gate;
mod ip;
mod service;
mod types;

pub use cookie::{REFRESH_COOKIE_NAME, bearer_token, clear_refresh_cookie, refresh_cookie, request_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use gate::{authenticate, authentication_gate};
pub use ip::{ClientIpHeader, extract_client_ip};
pub use service::{AuthError, LoginOutcome, TokenPair, TokenService};
pub use types::{AuthState, FailureReason, Principal};
