//! Registration, email verification, login, refresh token reissue (rotation) and logout.
//!
//! Each member owns at most one refresh token record. Login overwrites it;
//! reissue swaps it for a new one only if the presented token is still the
//! stored one, so a refresh token can be exchanged exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::types::Principal;
use crate::db::{Database, Member, MemberRole};
use crate::jwt::{IssuedToken, ParseError, SignError, TokenIssuer, now_millis};
use crate::mail::VerificationMailer;
use crate::password::{CredentialError, CredentialVerifier};

/// How long a signup verification token stays valid.
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Protocol-level authentication failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("member not found")]
    MemberNotFound,
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("invalid or expired verification token")]
    InvalidVerificationToken,
    #[error("email is already verified")]
    AlreadyVerified,
    #[error("token store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
    #[error(transparent)]
    Token(#[from] SignError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// A freshly minted access + refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub tokens: TokenPair,
}

/// Orchestrates credential checks, token minting and refresh record rotation.
#[derive(Clone)]
pub struct TokenService {
    db: Database,
    issuer: Arc<TokenIssuer>,
    credentials: Arc<dyn CredentialVerifier>,
    mailer: VerificationMailer,
}

impl TokenService {
    pub fn new(
        db: Database,
        issuer: Arc<TokenIssuer>,
        credentials: Arc<dyn CredentialVerifier>,
        mailer: VerificationMailer,
    ) -> Self {
        Self {
            db,
            issuer,
            credentials,
            mailer,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Create a member with a hashed password. Returns the member ID.
    ///
    /// Admins are verified on creation. Everyone else gets a verification
    /// token by mail and cannot log in until it is confirmed.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: MemberRole,
    ) -> Result<i64, AuthError> {
        let verifier = self.credentials.clone();
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| CredentialError::new(e.to_string()))??;

        let members = self.db.members();
        let created = match role {
            MemberRole::Admin => members.create(email, &hash, role).await.map(|id| (id, None)),
            MemberRole::User => {
                let token = uuid::Uuid::new_v4().to_string();
                let expires_at =
                    now_millis().saturating_add(VERIFICATION_TOKEN_TTL.as_secs() * 1000);
                members
                    .create_unverified(email, &hash, role, &token, expires_at)
                    .await
                    .map(|id| (id, Some(token)))
            }
        };

        let (id, token) = match created {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => return Err(AuthError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        };

        info!(member_id = id, role = role.as_str(), "Member registered");
        if let Some(token) = token {
            self.mailer.send_verification(email, &token);
        }
        Ok(id)
    }

    /// Confirm a member's email with the token they were mailed.
    pub async fn verify_email(&self, email: &str, token: &str) -> Result<(), AuthError> {
        let members = self.db.members();
        let member = members
            .get_by_email(email)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        if member.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        if !members.confirm_email(member.id, token, now_millis()).await? {
            debug!(member_id = member.id, "Verification token rejected");
            return Err(AuthError::InvalidVerificationToken);
        }

        info!(member_id = member.id, "Email verified");
        Ok(())
    }

    /// Check credentials and issue a new token pair, replacing any stored refresh token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let member = self
            .db
            .members()
            .get_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &member.password_hash).await? {
            debug!(member_id = member.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if !member.email_verified {
            debug!(member_id = member.id, "Login before email verification");
            return Err(AuthError::InvalidCredentials);
        }

        let principal = principal_of(&member);
        let tokens = self.mint(&principal)?;

        self.db
            .refresh_tokens()
            .upsert(member.id, &tokens.refresh.token, tokens.refresh.expires_at)
            .await?;

        info!(member_id = member.id, "Member logged in");
        Ok(LoginOutcome { principal, tokens })
    }

    /// Exchange a refresh token for a new pair, rotating the stored refresh token.
    pub async fn reissue(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let store = self.db.refresh_tokens();

        let claims = match self.issuer.codec().parse_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(ParseError::Expired) => {
                self.discard_expired(refresh_token).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                debug!(error = %e, "Rejected refresh token");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // Not found means it was superseded by a later reissue or login
        let record = store
            .find_by_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if claims.subject_id() != Some(record.member_id) {
            warn!(
                member_id = record.member_id,
                sub = %claims.sub,
                "Refresh token subject does not match its record"
            );
            return Err(AuthError::InvalidCredentials);
        }

        if record.is_expired_at(now_millis()) {
            store.delete_token(record.member_id, refresh_token).await?;
            info!(member_id = record.member_id, "Deleted expired refresh token");
            return Err(AuthError::InvalidCredentials);
        }

        let member = self
            .db
            .members()
            .get_by_id(record.member_id)
            .await?
            .ok_or(AuthError::MemberNotFound)?;

        let tokens = self.mint(&principal_of(&member))?;

        let rotated = store
            .rotate(
                member.id,
                refresh_token,
                &tokens.refresh.token,
                tokens.refresh.expires_at,
            )
            .await?;

        if !rotated {
            info!(
                member_id = member.id,
                "Refresh token was rotated concurrently"
            );
            return Err(AuthError::InvalidCredentials);
        }

        debug!(member_id = member.id, "Reissued token pair");
        Ok(tokens)
    }

    /// Revoke the member's refresh token. Returns whether a record existed.
    pub async fn logout(&self, member_id: i64) -> Result<bool, AuthError> {
        let deleted = self.db.refresh_tokens().delete(member_id).await?;
        info!(member_id, "Member logged out");
        Ok(deleted)
    }

    fn mint(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.issuer.issue_access_token(principal)?,
            refresh: self.issuer.issue_refresh_token(principal.id)?,
        })
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let verifier = self.credentials.clone();
        let (password, hash) = (password.to_owned(), hash.to_owned());
        let matches = tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| CredentialError::new(e.to_string()))??;
        Ok(matches)
    }

    /// Best-effort removal of the record holding an expired refresh token.
    async fn discard_expired(&self, refresh_token: &str) {
        let store = self.db.refresh_tokens();
        match store.find_by_token(refresh_token).await {
            Ok(Some(record)) => match store.delete_token(record.member_id, refresh_token).await {
                Ok(true) => info!(member_id = record.member_id, "Deleted expired refresh token"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to delete expired refresh token"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to look up expired refresh token"),
        }
    }
}

fn principal_of(member: &Member) -> Principal {
    Principal {
        id: member.id,
        email: member.email.clone(),
        role: member.role,
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}
