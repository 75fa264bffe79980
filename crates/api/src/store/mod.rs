//! Content Store interfaces
//!
//! Handlers and the auth layer only see these traits. `PgStore` backs them in
//! production; `MemoryStore` backs them in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socialnet_shared::{
    Comment, NewPost, NewUser, PendingInvitation, Post, PostId, Role, StoreError, User, UserId,
};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::email::MailError;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// Hands a freshly created pending user to the outside world.
///
/// Invoked by [`UserStore::create_and_invite`] while the registration
/// transaction is still open; an error aborts the registration.
#[async_trait]
pub trait InviteDelivery: Send + Sync {
    async fn deliver(&self, user: &User) -> Result<(), MailError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// Active users only; the result carries the password hash for verification.
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Insert an inactive user and its invitation, then run `delivery`, as one unit.
    async fn create_and_invite(
        &self,
        user: &NewUser,
        invitation: &PendingInvitation,
        delivery: &dyn InviteDelivery,
    ) -> Result<User, StoreError>;

    /// Consume the unexpired invitation matching `token_hash` and activate its user.
    async fn activate(&self, token_hash: &str, now: OffsetDateTime) -> Result<User, StoreError>;

    /// Remove a user together with any residual invitations.
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: &NewPost) -> Result<Post, StoreError>;

    /// The post without comments.
    async fn get_by_id(&self, id: PostId) -> Result<Post, StoreError>;

    /// Persist title and content if `post.version` is still current.
    ///
    /// Bumps `version` and `updated_at` on success. A stale version is `NotFound`.
    async fn update(&self, post: &mut Post) -> Result<(), StoreError>;

    async fn delete(&self, id: PostId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments on a post, newest first.
    async fn get_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError>;
}

#[async_trait]
pub trait FollowerStore: Send + Sync {
    /// `follower` starts following `user`. Following twice is a `Conflict`.
    async fn follow(&self, user: UserId, follower: UserId) -> Result<(), StoreError>;

    /// `follower` stops following `user`. Not following is `NotFound`.
    async fn unfollow(&self, user: UserId, follower: UserId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Every store interface the service needs, as shared trait objects
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    pub followers: Arc<dyn FollowerStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl Storage {
    /// All interfaces backed by one Postgres pool
    pub fn postgres(pool: PgPool, query_timeout: Duration) -> Self {
        Self::from_backend(Arc::new(PgStore::new(pool, query_timeout)))
    }

    /// All interfaces backed by the same object
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + RoleStore + PostStore + CommentStore + FollowerStore + HealthProbe + 'static,
    {
        Self {
            users: backend.clone(),
            roles: backend.clone(),
            posts: backend.clone(),
            comments: backend.clone(),
            followers: backend.clone(),
            health: backend,
        }
    }
}
