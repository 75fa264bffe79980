//! Registration and session token routes

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use socialnet_shared::{NewUser, StoreError, User};
use time::OffsetDateTime;

use crate::{
    auth::{hash_password, validate_password, verify_password},
    error::{ApiError, ApiResult},
    state::{AppState, DEFAULT_ROLE},
};

const MAX_USERNAME_CHARS: usize = 100;
const MAX_EMAIL_BYTES: usize = 255;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// The new (inactive) account and its one-time activation token
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a user and send the activation invitation.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(req) = payload?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    validate_registration(&username, &email, &req.password)?;

    let password_hash = hash_password(&req.password)?;

    let invited = state
        .invitations
        .create_and_invite(NewUser {
            username,
            email,
            password_hash,
            role_name: DEFAULT_ROLE.to_string(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: invited.user,
            token: invited.token,
        }),
    ))
}

/// Exchange email and password for a session token.
///
/// Unknown email, inactive account and wrong password are indistinguishable.
pub async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let Json(req) = payload?;
    let email = req.email.trim().to_lowercase();

    if !is_valid_email(&email) || req.password.is_empty() {
        return Err(ApiError::Validation("a valid email and password are required".to_string()));
    }

    let user = match state.storage.users.get_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            tracing::debug!("Token requested for unknown or inactive account");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Wrong password on token request");
        return Err(ApiError::Unauthorized);
    }

    let issued = state.jwt.issue(user.id)?;
    tracing::info!(user_id = %user.id, jti = %issued.jti, "Session token issued");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token: issued.token,
            token_type: "Bearer",
            expires_at: issued.expires_at,
        }),
    ))
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_registration(username: &str, email: &str, password: &str) -> ApiResult<()> {
    let username_chars = username.chars().count();
    if username_chars == 0 || username_chars > MAX_USERNAME_CHARS {
        return Err(ApiError::Validation(format!(
            "username must be between 1 and {} characters",
            MAX_USERNAME_CHARS
        )));
    }

    if !is_valid_email(email) {
        return Err(ApiError::Validation("email must be a valid email address".to_string()));
    }

    validate_password(password).map_err(|e| ApiError::Validation(e.to_string()))
}

/// Simplified RFC 5322 address check
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_BYTES {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_alphanumeric() || ".+-_".contains(c))
    {
        return false;
    }

    if domain.starts_with('-') || domain.ends_with('-') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }

    // At least two labels, alphabetic TLD
    match domain.rsplit_once('.') {
        Some((_, tld)) => tld.len() >= 2 && tld.chars().all(|c| c.is_alphabetic()),
        None => false,
    }
}
