//! Authentication types shared by the gate, extractors and handlers.

use serde::Serialize;

use crate::db::MemberRole;

/// The identity derived from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub role: MemberRole,
}

/// Why the gate refused a presented bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ExpiredToken,
    UnsupportedToken,
    InvalidToken,
    UnknownError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ExpiredToken => "EXPIRED_TOKEN",
            FailureReason::UnsupportedToken => "UNSUPPORTED_TOKEN",
            FailureReason::InvalidToken => "INVALID_TOKEN",
            FailureReason::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped outcome of the authentication gate, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No bearer token was presented
    #[default]
    Unauthenticated,
    Authenticated(Principal),
    Rejected(FailureReason),
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            AuthState::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}
