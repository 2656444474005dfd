//! JWT token signing, claim encoding and issuance.
//!
//! Two token kinds share one signing secret:
//! - Access tokens: short-lived, self-contained (subject, email, role)
//! - Refresh tokens: long-lived, tracked in the `refresh_tokens` table with a JTI
//!
//! All timestamps inside the claims are Unix milliseconds.

mod codec;
mod issuer;
mod signer;

pub use codec::{AccessTokenError, ParseError, TokenClaims, TokenCodec, TokenType};
pub use issuer::{
    DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL, IssuedToken, TokenIssuer,
};
pub use signer::{SignError, Signer};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
