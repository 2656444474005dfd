//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(String),
    InvalidCredentials,
    InvalidVerificationToken,
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::Validation(_)
            | ApiError::InvalidVerificationToken => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            // Unknown member and bad password look the same to the client
            AuthError::InvalidCredentials | AuthError::MemberNotFound => Self::InvalidCredentials,
            AuthError::DuplicateEmail => {
                Self::Conflict("DUPLICATE_EMAIL", "Email is already registered".into())
            }
            AuthError::InvalidVerificationToken => Self::InvalidVerificationToken,
            AuthError::AlreadyVerified => {
                Self::Conflict("ALREADY_VERIFIED", "Email is already verified".into())
            }
            AuthError::StoreUnavailable(e) => Self::db_error("Token store unavailable", e),
            AuthError::Token(e) => {
                error!(error = %e, "Failed to sign token");
                Self::internal("Failed to generate token")
            }
            AuthError::Credential(e) => {
                error!(error = %e, "Credential check failed");
                Self::internal("Failed to check credentials")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match self {
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::Validation(msg) => ("VALIDATION_ERROR", msg),
            ApiError::InvalidCredentials => ("INVALID_CREDENTIALS", "Invalid credentials".into()),
            ApiError::InvalidVerificationToken => (
                "INVALID_VERIFICATION_TOKEN",
                "Invalid or expired verification token".into(),
            ),
            ApiError::Conflict(code, msg) => (code, msg),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };
        (status, Json(ErrorResponse { code, message })).into_response()
    }
}
