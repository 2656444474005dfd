//! Member account and session endpoints.
//!
//! - POST `/signup` - Create a member account and mail a verification token
//! - POST `/verify` - Confirm the email address with the mailed token
//! - POST `/login` - Check credentials, return an access token and set the refresh cookie
//! - POST `/reissue` - Exchange the refresh cookie for a new token pair
//! - POST `/logout` - Revoke the refresh token and clear the cookie
//! - GET `/me` - Current principal

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::auth::{
    Auth, AuthError, Principal, REFRESH_COOKIE_NAME, TokenService, clear_refresh_cookie,
    refresh_cookie, request_cookie,
};
use crate::db::MemberRole;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

const MAX_EMAIL_LENGTH: usize = 254;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Clone)]
pub struct MembersState {
    pub service: TokenService,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: MembersState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/signup", post(signup))
        .route("/verify", post(verify))
        .route("/reissue", post(reissue))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
        .merge(login_router)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    email: String,
    token: String,
}

#[derive(Serialize)]
struct SignupResponse {
    id: i64,
    email: String,
    role: MemberRole,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    email: String,
    role: MemberRole,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReissueResponse {
    access_token: String,
}

fn validate_signup(email: &str, password: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::validation("Email cannot be empty"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::validation("Email is too long"));
    }

    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_shape || email.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("Email is not valid"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::validation(format!(
            "Password cannot be longer than {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

async fn signup(
    State(state): State<MembersState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    validate_signup(email, &payload.password)?;

    let id = state
        .service
        .register(email, &payload.password, MemberRole::User)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id,
            email: email.to_string(),
            role: MemberRole::User,
        }),
    ))
}

async fn verify(
    State(state): State<MembersState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .verify_email(payload.email.trim(), payload.token.trim())
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn login(
    State(state): State<MembersState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .login(payload.email.trim(), &payload.password)
        .await?;

    let cookie = refresh_cookie(
        &outcome.tokens.refresh.token,
        outcome.tokens.refresh.ttl,
        state.secure_cookies,
    );

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            access_token: outcome.tokens.access.token,
            email: outcome.principal.email,
            role: outcome.principal.role,
        }),
    ))
}

/// Rotate the refresh token. Any rejection clears the cookie so the client
/// stops presenting a token that can never succeed.
async fn reissue(
    State(state): State<MembersState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh_token = request_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing refresh token"))?;

    match state.service.reissue(refresh_token).await {
        Ok(tokens) => {
            let cookie = refresh_cookie(
                &tokens.refresh.token,
                tokens.refresh.ttl,
                state.secure_cookies,
            );
            Ok((
                StatusCode::OK,
                [(SET_COOKIE, cookie)],
                Json(ReissueResponse {
                    access_token: tokens.access.token,
                }),
            )
                .into_response())
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::MemberNotFound)) => {
            info!(error = %e, "Reissue rejected");
            Ok((
                [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
                ApiError::from(e),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn logout(
    State(state): State<MembersState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    state.service.logout(auth.principal.id).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(serde_json::json!({ "success": true })),
    ))
}

async fn me(auth: Auth) -> Json<Principal> {
    Json(auth.principal)
}
