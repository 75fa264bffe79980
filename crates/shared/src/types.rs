//! Common types used across SocialNet

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// ID Wrappers
// =============================================================================

/// User ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Post ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PostId(pub i64);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PostId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Role reference data. Higher `level` dominates lower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub level: i64,
}

/// Registered user (the principal once authenticated)
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for creating a pending (inactive) user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Name of the role the account starts with
    pub role_name: String,
}

/// Invitation row to persist alongside a pending user.
///
/// Only the digest of the raw token is ever stored.
#[derive(Debug, Clone)]
pub struct PendingInvitation {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

// =============================================================================
// Content
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Owner, fixed at creation
    pub user_id: UserId,
    /// Optimistic concurrency counter, bumped on every update
    pub version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: PostId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
