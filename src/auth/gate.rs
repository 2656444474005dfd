//! Per-request authentication gate.
//!
//! Verifies the bearer access token without touching the database and records
//! the outcome as an [`AuthState`] in the request extensions. The gate never
//! rejects a request itself: route extractors decide whether the outcome is
//! acceptable and translate failures into responses.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::cookie::bearer_token;
use super::types::{AuthState, FailureReason};
use crate::jwt::{AccessTokenError, ParseError, TokenCodec};

/// Derive the authentication outcome from the request headers.
pub fn authenticate(headers: &HeaderMap, codec: &TokenCodec) -> AuthState {
    let Some(token) = bearer_token(headers) else {
        return AuthState::Unauthenticated;
    };

    match codec.parse_access(token) {
        Ok(principal) => AuthState::Authenticated(principal),
        Err(e) => {
            let reason = failure_reason(e);
            debug!(reason = %reason, error = %e, "Rejected bearer token");
            AuthState::Rejected(reason)
        }
    }
}

fn failure_reason(error: AccessTokenError) -> FailureReason {
    match error {
        AccessTokenError::Parse(ParseError::Expired) => FailureReason::ExpiredToken,
        AccessTokenError::Parse(ParseError::UnsupportedFormat) => FailureReason::UnsupportedToken,
        AccessTokenError::Parse(ParseError::Malformed | ParseError::InvalidSignature) => {
            FailureReason::InvalidToken
        }
        AccessTokenError::InvalidSubject => FailureReason::UnknownError,
    }
}

/// Middleware that runs [`authenticate`] and stores the result for downstream layers.
pub async fn authentication_gate(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Response {
    let state = authenticate(request.headers(), &codec);
    request.extensions_mut().insert(state);
    next.run(request).await
}
