//! Authentication middleware
//!
//! Two independent guards, composed per route: `require_bearer` for users and
//! `require_basic` for operational endpoints. Ownership-aware routes add
//! `require_owner_or_role` after the principal and the resource are resolved.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};
use socialnet_shared::{StoreError, User, UserId};

use super::authorizer::{AuthzError, RoleAuthorizer};
use super::basic::{parse_basic_authorization, BasicCredentials};
use super::jwt::JwtManager;
use crate::error::ApiError;
use crate::store::UserStore;

/// Authentication state shared by the guards
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtManager,
    pub users: Arc<dyn UserStore>,
    pub basic: BasicCredentials,
}

/// The resolved principal, inserted by `require_bearer`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Token id, for log correlation
    pub jti: String,
}

/// Owner of the resource addressed by the request, inserted by resource loaders
#[derive(Debug, Clone, Copy)]
pub struct ResourceOwner(pub UserId);

/// Extract the token from `Authorization: Bearer <token>`
fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Require a valid session token for an existing, active user.
///
/// Every credential failure yields the same `Unauthorized`; the cause is
/// only logged.
pub async fn require_bearer(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or_else(|| {
        tracing::debug!("Missing or malformed bearer authorization header");
        ApiError::Unauthorized
    })?;

    let claims = auth.jwt.validate(token).map_err(|e| {
        tracing::debug!(reason = %e, "Rejected session token");
        ApiError::Unauthorized
    })?;

    let user_id = claims.user_id().map_err(|e| {
        tracing::debug!(reason = %e, jti = %claims.jti, "Rejected session token");
        ApiError::Unauthorized
    })?;

    let user = match auth.users.get_by_id(user_id).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            tracing::debug!(user_id = %user_id, jti = %claims.jti, "Token subject no longer exists");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => return Err(e.into()),
    };

    if !user.is_active {
        tracing::debug!(user_id = %user_id, "Token subject is not active");
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(AuthUser {
        user,
        jti: claims.jti,
    });

    Ok(next.run(req).await)
}

/// Require the configured operational credential pair.
pub async fn require_basic(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::BasicUnauthorized)?;

    let (username, password) = parse_basic_authorization(header_value).map_err(|e| {
        tracing::debug!(reason = %e, "Malformed basic authorization header");
        ApiError::BasicUnauthorized
    })?;

    if !auth.basic.verify(&username, &password) {
        tracing::warn!("Invalid operational credentials");
        return Err(ApiError::BasicUnauthorized);
    }

    Ok(next.run(req).await)
}

/// State for `require_owner_or_role`: who may act besides the owner
#[derive(Clone)]
pub struct OwnershipGuard {
    pub authorizer: RoleAuthorizer,
    pub required_role: &'static str,
}

impl OwnershipGuard {
    pub fn new(authorizer: RoleAuthorizer, required_role: &'static str) -> Self {
        Self {
            authorizer,
            required_role,
        }
    }
}

/// Allow the resource owner, or a principal whose role dominates the required one.
pub async fn require_owner_or_role(
    State(guard): State<OwnershipGuard>,
    Extension(principal): Extension<AuthUser>,
    Extension(ResourceOwner(owner_id)): Extension<ResourceOwner>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let allowed = guard
        .authorizer
        .authorize(&principal.user, owner_id, guard.required_role)
        .await
        .map_err(|e| {
            if let AuthzError::UnknownRole(ref name) = e {
                tracing::error!(role = %name, "Required role is missing from the roles table");
            }
            ApiError::from(e)
        })?;

    if !allowed {
        tracing::debug!(
            user_id = %principal.user.id,
            owner_id = %owner_id,
            required_role = guard.required_role,
            "Insufficient role for non-owner"
        );
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}
