//! Post routes

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use socialnet_shared::{NewPost, Post, PostId};

use crate::{
    auth::{AuthUser, ResourceOwner},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_TITLE_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields keep their value
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Resolve `:post_id` and expose the post and its owner to guards and handlers.
pub async fn load_post(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let Path(raw_id) = path?;
    let post_id = raw_id
        .parse::<i64>()
        .map(PostId)
        .map_err(|_| ApiError::BadRequest(format!("invalid post id: {}", raw_id)))?;

    let post = state.storage.posts.get_by_id(post_id).await?;

    req.extensions_mut().insert(ResourceOwner(post.user_id));
    req.extensions_mut().insert(post);
    Ok(next.run(req).await)
}

fn validate_field(name: &str, value: &str, max_chars: usize) -> ApiResult<()> {
    let chars = value.chars().count();
    if chars == 0 || chars > max_chars {
        return Err(ApiError::Validation(format!(
            "{} must be between 1 and {} characters",
            name, max_chars
        )));
    }
    Ok(())
}

/// Create a post owned by the principal.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let Json(req) = payload?;
    validate_field("title", &req.title, MAX_TITLE_CHARS)?;
    validate_field("content", &req.content, MAX_CONTENT_CHARS)?;

    let post = state
        .storage
        .posts
        .create(&NewPost {
            title: req.title,
            content: req.content,
            tags: req.tags,
            user_id: principal.user.id,
        })
        .await?;

    tracing::info!(post_id = %post.id, user_id = %principal.user.id, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// A post with its comments, newest first.
pub async fn get_post(
    State(state): State<AppState>,
    Extension(mut post): Extension<Post>,
) -> ApiResult<Json<Post>> {
    post.comments = state.storage.comments.get_by_post_id(post.id).await?;
    Ok(Json(post))
}

/// Edit title and/or content. Owner, or moderator and above.
///
/// A concurrent edit between load and write surfaces as `NotFound`.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(mut post): Extension<Post>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(req) = payload?;

    if let Some(title) = req.title {
        validate_field("title", &title, MAX_TITLE_CHARS)?;
        post.title = title;
    }
    if let Some(content) = req.content {
        validate_field("content", &content, MAX_CONTENT_CHARS)?;
        post.content = content;
    }

    state.storage.posts.update(&mut post).await?;
    Ok(Json(post))
}

/// Remove a post. Owner, or admin.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
    Extension(post): Extension<Post>,
) -> ApiResult<StatusCode> {
    state.storage.posts.delete(post.id).await?;
    tracing::info!(post_id = %post.id, deleted_by = %principal.user.id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}
