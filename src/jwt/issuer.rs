//! Access and refresh token minting.

use std::time::Duration;

use super::codec::{TokenClaims, TokenCodec, TokenType};
use super::now_millis;
use super::signer::SignError;
use crate::auth::Principal;

/// Default access token lifetime: 30 minutes
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Default refresh token lifetime: 2 weeks
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at (Unix milliseconds)
    pub issued_at: u64,
    /// Expiration (Unix milliseconds)
    pub expires_at: u64,
    /// Token lifetime
    pub ttl: Duration,
}

/// Mints access and refresh tokens with configured lifetimes.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            codec,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate an access token carrying the principal's email and role.
    pub fn issue_access_token(&self, principal: &Principal) -> Result<IssuedToken, SignError> {
        let now = now_millis();
        let claims = TokenClaims {
            sub: principal.id.to_string(),
            email: Some(principal.email.clone()),
            role: Some(principal.role),
            token_type: TokenType::Access,
            jti: None,
            iat: now,
            exp: now.saturating_add(ttl_millis(self.access_ttl)),
        };
        self.mint(&claims, self.access_ttl)
    }

    /// Generate a refresh token. Only the subject is carried, plus a fresh JTI.
    pub fn issue_refresh_token(&self, principal_id: i64) -> Result<IssuedToken, SignError> {
        let now = now_millis();
        let claims = TokenClaims {
            sub: principal_id.to_string(),
            email: None,
            role: None,
            token_type: TokenType::Refresh,
            jti: Some(uuid::Uuid::new_v4().to_string()),
            iat: now,
            exp: now.saturating_add(ttl_millis(self.refresh_ttl)),
        };
        self.mint(&claims, self.refresh_ttl)
    }

    fn mint(&self, claims: &TokenClaims, ttl: Duration) -> Result<IssuedToken, SignError> {
        let token = self.codec.issue(claims)?;
        Ok(IssuedToken {
            token,
            issued_at: claims.iat,
            expires_at: claims.exp,
            ttl,
        })
    }
}

/// Lifetimes shorter than a millisecond still expire one millisecond later.
/// Lifetimes beyond `u64` milliseconds are clamped.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
