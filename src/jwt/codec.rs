//! Claim encoding and verification-failure classification.

use serde::{Deserialize, Serialize};

use super::now_millis;
use super::signer::{SignError, Signer};
use crate::auth::Principal;
use crate::db::MemberRole;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived, self-contained credential used on every request
    Access,
    /// Long-lived credential exchanged for a new pair, tracked in the database
    Refresh,
}

/// Claims carried by both token kinds.
///
/// Refresh tokens omit `email` and `role` and carry a `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (member id)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// JWT ID, unique per refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix milliseconds)
    pub iat: u64,
    /// Expiration time (Unix milliseconds)
    pub exp: u64,
}

impl TokenClaims {
    /// Principal id encoded in `sub`, if it is a valid member id.
    pub fn subject_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Why a token string could not be turned into trusted claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("unsupported token")]
    UnsupportedFormat,
}

/// Encodes claims into signed tokens and decodes them back.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    signer: Signer,
}

impl TokenCodec {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(Signer::new(secret))
    }

    pub fn issue(&self, claims: &TokenClaims) -> Result<String, SignError> {
        self.signer.sign(claims)
    }

    /// Verify `token` against the current clock.
    pub fn parse(&self, token: &str) -> Result<TokenClaims, ParseError> {
        self.parse_at(token, now_millis())
    }

    /// Verify `token` as seen at `now` (Unix milliseconds).
    ///
    /// A token is valid while `now < exp`; there is no leeway.
    pub fn parse_at(&self, token: &str, now: u64) -> Result<TokenClaims, ParseError> {
        let claims: TokenClaims = self.signer.verify(token)?;

        if claims.exp <= claims.iat {
            return Err(ParseError::Malformed);
        }
        if now >= claims.exp {
            return Err(ParseError::Expired);
        }

        Ok(claims)
    }

    /// Verify an access token and build the principal it describes.
    pub fn parse_access(&self, token: &str) -> Result<Principal, AccessTokenError> {
        let claims = self.parse(token)?;

        if claims.token_type != TokenType::Access {
            return Err(ParseError::UnsupportedFormat.into());
        }

        let (Some(email), Some(role)) = (claims.email.clone(), claims.role) else {
            return Err(ParseError::UnsupportedFormat.into());
        };

        let id = claims
            .subject_id()
            .ok_or(AccessTokenError::InvalidSubject)?;

        Ok(Principal { id, email, role })
    }

    /// Verify a refresh token.
    pub fn parse_refresh(&self, token: &str) -> Result<TokenClaims, ParseError> {
        let claims = self.parse(token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(ParseError::UnsupportedFormat);
        }

        Ok(claims)
    }
}

/// Failure to derive a principal from an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessTokenError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Signed and unexpired, but `sub` is not a member id
    #[error("token subject is not a member id")]
    InvalidSubject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::from_secret(b"test-secret-key-for-testing")
    }

    fn access_claims(iat: u64, exp: u64) -> TokenClaims {
        TokenClaims {
            sub: "7".to_string(),
            email: Some("a@x.com".to_string()),
            role: Some(MemberRole::User),
            token_type: TokenType::Access,
            jti: None,
            iat,
            exp,
        }
    }

    #[test]
    fn test_round_trip_before_expiry() {
        let codec = codec();
        let claims = access_claims(1_000, 61_000);
        let token = codec.issue(&claims).unwrap();

        assert_eq!(codec.parse_at(&token, 1_000).unwrap(), claims);
        assert_eq!(codec.parse_at(&token, 60_999).unwrap(), claims);
    }

    #[test]
    fn test_expired_at_and_after_exp() {
        let codec = codec();
        let token = codec.issue(&access_claims(1_000, 61_000)).unwrap();

        assert_eq!(codec.parse_at(&token, 61_000), Err(ParseError::Expired));
        assert_eq!(codec.parse_at(&token, 61_001), Err(ParseError::Expired));
    }

    #[test]
    fn test_exp_not_after_iat_is_malformed() {
        let codec = codec();
        let token = codec.issue(&access_claims(5_000, 5_000)).unwrap();

        assert_eq!(codec.parse_at(&token, 0), Err(ParseError::Malformed));
    }

    #[test]
    fn test_refresh_claims_omit_email_and_role() {
        let codec = codec();
        let claims = TokenClaims {
            sub: "7".to_string(),
            email: None,
            role: None,
            token_type: TokenType::Refresh,
            jti: Some("jti-1".to_string()),
            iat: 1_000,
            exp: 2_000,
        };
        let token = codec.issue(&claims).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        assert!(!payload.is_empty());
        assert_eq!(codec.parse_at(&token, 1_500).unwrap(), claims);
    }

    #[test]
    fn test_parse_access_builds_principal() {
        let codec = codec();
        let now = now_millis();
        let token = codec.issue(&access_claims(now, now + 60_000)).unwrap();

        let principal = codec.parse_access(&token).unwrap();
        assert_eq!(principal.id, 7);
        assert_eq!(principal.email, "a@x.com");
        assert_eq!(principal.role, MemberRole::User);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = codec();
        let now = now_millis();
        let claims = TokenClaims {
            sub: "7".to_string(),
            email: None,
            role: None,
            token_type: TokenType::Refresh,
            jti: Some("jti-1".to_string()),
            iat: now,
            exp: now + 60_000,
        };
        let token = codec.issue(&claims).unwrap();

        assert_eq!(
            codec.parse_access(&token),
            Err(AccessTokenError::Parse(ParseError::UnsupportedFormat))
        );
        assert!(codec.parse_refresh(&token).is_ok());
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let codec = codec();
        let now = now_millis();
        let token = codec.issue(&access_claims(now, now + 60_000)).unwrap();

        assert_eq!(
            codec.parse_refresh(&token),
            Err(ParseError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_non_numeric_subject() {
        let codec = codec();
        let now = now_millis();
        let mut claims = access_claims(now, now + 60_000);
        claims.sub = "not-a-number".to_string();
        let token = codec.issue(&claims).unwrap();

        assert_eq!(
            codec.parse_access(&token),
            Err(AccessTokenError::InvalidSubject)
        );
    }

    #[test]
    fn test_tampering_never_verifies() {
        const ALPHABET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

        let codec = codec();
        let token = codec.issue(&access_claims(1_000, u64::MAX / 2)).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'.' {
                continue;
            }
            let replacement = ALPHABET
                .iter()
                .copied()
                .find(|&c| c != bytes[i])
                .unwrap();
            let mut tampered = bytes.to_vec();
            tampered[i] = replacement;
            let tampered = String::from_utf8(tampered).unwrap();

            let result = codec.parse_at(&tampered, 2_000);
            assert!(
                matches!(
                    result,
                    Err(ParseError::InvalidSignature) | Err(ParseError::Malformed)
                ),
                "tampering byte {} produced {:?}",
                i,
                result
            );
        }
    }

    #[test]
    fn test_unsigned_token_rejected() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let codec = codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&access_claims(1_000, u64::MAX / 2)).unwrap(),
        );
        let token = format!("{}.{}.", header, payload);

        assert!(matches!(
            codec.parse_at(&token, 2_000),
            Err(ParseError::Malformed) | Err(ParseError::InvalidSignature)
        ));
    }
}
