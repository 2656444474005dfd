//! Axum extractors for authentication.
//!
//! These read the [`AuthState`] left in the request extensions by
//! [`authentication_gate`](super::gate::authentication_gate). Routes mounted
//! without the gate see every request as unauthenticated.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::types::{AuthState, Principal};
use crate::db::MemberRole;

fn auth_state(parts: &Parts) -> AuthState {
    parts
        .extensions
        .get::<AuthState>()
        .cloned()
        .unwrap_or_default()
}

/// Role requirement checked by [`Auth`].
pub trait RoleConstraint: Send + Sync {
    fn allows(role: MemberRole) -> bool;
}

/// Any authenticated member.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: MemberRole) -> bool {
        true
    }
}

/// Only members with the `ADMIN` role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: MemberRole) -> bool {
        role == MemberRole::Admin
    }
}

/// Extractor for endpoints that require an authenticated principal with a given role.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub principal: Principal,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = auth_state(parts);
        let Some(principal) = state.principal().cloned() else {
            return Err(ApiAuthError::from_state(&state));
        };

        if !R::allows(principal.role) {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            principal,
            _role: PhantomData,
        })
    }
}
