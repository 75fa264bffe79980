//! User routes: activation, profile, deletion and the follower graph

use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use socialnet_shared::{StoreError, User, UserId};

use crate::{
    auth::{AuthUser, ResourceOwner},
    error::{ApiError, ApiResult},
    state::AppState,
};

/// The user addressed by `:user_id`, inserted by `load_user`
#[derive(Debug, Clone)]
pub struct TargetUser(pub User);

/// Resolve `:user_id` and expose it, and its ownership, to the handler and guards.
pub async fn load_user(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let Path(raw_id) = path?;
    let user_id = raw_id
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {}", raw_id)))?;

    let user = state.storage.users.get_by_id(user_id).await?;

    req.extensions_mut().insert(ResourceOwner(user.id));
    req.extensions_mut().insert(TargetUser(user));
    Ok(next.run(req).await)
}

/// Consume an invitation token and activate its account.
pub async fn activate_user(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(token) = path?;
    state.invitations.activate(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(Extension(TargetUser(user)): Extension<TargetUser>) -> Json<User> {
    Json(user)
}

/// Delete an account. Allowed for the account itself or an admin.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
    Extension(TargetUser(user)): Extension<TargetUser>,
) -> ApiResult<StatusCode> {
    state.invitations.delete(user.id).await?;
    tracing::info!(user_id = %user.id, deleted_by = %principal.user.id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The principal starts following the path user.
pub async fn follow_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
    Extension(TargetUser(target)): Extension<TargetUser>,
) -> ApiResult<StatusCode> {
    if principal.user.id == target.id {
        return Err(ApiError::BadRequest("you cannot follow yourself".to_string()));
    }

    state
        .storage
        .followers
        .follow(target.id, principal.user.id)
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ApiError::Conflict("already following this user".to_string()),
            other => other.into(),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// The principal stops following the path user.
pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
    Extension(TargetUser(target)): Extension<TargetUser>,
) -> ApiResult<StatusCode> {
    state
        .storage
        .followers
        .unfollow(target.id, principal.user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
