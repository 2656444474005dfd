//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::types::{AuthState, FailureReason};

/// Why a route refused the request's authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No bearer token presented
    NotAuthenticated,
    /// A token was presented and rejected by the gate
    Rejected(FailureReason),
    InsufficientRole,
}

/// API authentication errors (JSON body with a distinguishing code).
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    /// Translate a non-authenticated gate outcome.
    pub(super) fn from_state(state: &AuthState) -> Self {
        match state.failure() {
            Some(reason) => Self::new(AuthErrorKind::Rejected(reason)),
            None => Self::new(AuthErrorKind::NotAuthenticated),
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::Rejected(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    /// Expired access tokens get their own code so clients know to call reissue.
    fn code(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::Rejected(FailureReason::ExpiredToken) => "TOKEN_EXPIRED",
            AuthErrorKind::NotAuthenticated | AuthErrorKind::Rejected(_) => "UNAUTHORIZED",
            AuthErrorKind::InsufficientRole => "FORBIDDEN",
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::Rejected(FailureReason::ExpiredToken) => "Access token has expired",
            AuthErrorKind::NotAuthenticated | AuthErrorKind::Rejected(_) => {
                "Authentication required"
            }
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            code: &'static str,
            message: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                code: self.code(),
                message: self.message(),
            }),
        )
            .into_response()
    }
}
