//! In-memory Content Store used by unit and router tests

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use socialnet_shared::{
    Comment, NewPost, NewUser, PendingInvitation, Post, PostId, Role, StoreError, User, UserId,
};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::{
    CommentStore, FollowerStore, HealthProbe, InviteDelivery, PostStore, RoleStore, UserStore,
};

#[derive(Debug, Clone)]
struct InvitationRow {
    user_id: UserId,
    expires_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    roles: Vec<Role>,
    users: HashMap<UserId, User>,
    invitations: HashMap<String, InvitationRow>,
    posts: HashMap<PostId, Post>,
    comments: Vec<Comment>,
    followers: HashSet<(UserId, UserId)>,
    next_user_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

/// Single-mutex store mirroring `PgStore` semantics.
///
/// Every operation holds the lock for its whole duration, which stands in
/// for the transaction. Mutations are applied only once all fallible steps
/// have succeeded.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store seeded with the `user` (1), `moderator` (2) and `admin` (3) roles
    pub fn new() -> Self {
        let roles = [
            ("user", "A user can create posts and comments", 1),
            ("moderator", "A moderator can update other users posts", 2),
            ("admin", "An admin can update and delete other users posts", 3),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (name, description, level))| Role {
            id: i as i64 + 1,
            name: name.to_string(),
            description: description.to_string(),
            level,
        })
        .collect();

        Self {
            inner: Mutex::new(Inner {
                roles,
                ..Inner::default()
            }),
        }
    }

    /// Insert an already active user holding `role_name`
    pub async fn insert_active_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role_name: &str,
    ) -> User {
        let mut inner = self.inner.lock().await;
        let role = inner
            .roles
            .iter()
            .find(|r| r.name == role_name)
            .cloned()
            .expect("role must be seeded");
        inner.next_user_id += 1;
        let user = User {
            id: UserId(inner.next_user_id),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_comment(&self, post_id: PostId, author: &User, content: &str) -> Comment {
        let mut inner = self.inner.lock().await;
        inner.next_comment_id += 1;
        let comment = Comment {
            id: inner.next_comment_id,
            post_id,
            user_id: author.id,
            username: author.username.clone(),
            content: content.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.comments.push(comment.clone());
        comment
    }

    pub async fn remove_role(&self, name: &str) {
        self.inner.lock().await.roles.retain(|r| r.name != name);
    }

    pub async fn invitation_count(&self) -> usize {
        self.inner.lock().await.invitations.len()
    }

    pub async fn invitation_hashes(&self) -> Vec<String> {
        self.inner.lock().await.invitations.keys().cloned().collect()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn is_following(&self, user: UserId, follower: UserId) -> bool {
        self.inner
            .lock()
            .await
            .followers
            .contains(&(user, follower))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.inner
            .lock()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email && u.is_active)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_and_invite(
        &self,
        user: &NewUser,
        invitation: &PendingInvitation,
        delivery: &dyn InviteDelivery,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        let role = inner
            .roles
            .iter()
            .find(|r| r.name == user.role_name)
            .cloned()
            .ok_or_else(|| StoreError::MissingRole(user.role_name.clone()))?;
        if inner.invitations.contains_key(&invitation.token_hash) {
            return Err(StoreError::Conflict);
        }

        let created = User {
            id: UserId(inner.next_user_id + 1),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            is_active: false,
            role,
            created_at: OffsetDateTime::now_utc(),
        };

        delivery
            .deliver(&created)
            .await
            .map_err(|e| StoreError::Delivery(e.to_string()))?;

        inner.next_user_id += 1;
        inner.users.insert(created.id, created.clone());
        inner.invitations.insert(
            invitation.token_hash.clone(),
            InvitationRow {
                user_id: created.id,
                expires_at: invitation.expires_at,
            },
        );
        Ok(created)
    }

    async fn activate(&self, token_hash: &str, now: OffsetDateTime) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;

        let user_id = inner
            .invitations
            .get(token_hash)
            .filter(|row| row.expires_at > now)
            .map(|row| row.user_id)
            .ok_or(StoreError::NotFound)?;

        let user = inner.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.is_active = true;
        let user = user.clone();

        inner.invitations.retain(|_, row| row.user_id != user_id);
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        inner.invitations.retain(|_, row| row.user_id != id);
        inner.followers.retain(|(user, follower)| *user != id && *follower != id);
        inner.posts.retain(|_, post| post.user_id != id);
        inner.comments.retain(|comment| comment.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError> {
        self.inner
            .lock()
            .await
            .roles
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, post: &NewPost) -> Result<Post, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&post.user_id) {
            return Err(StoreError::NotFound);
        }

        inner.next_post_id += 1;
        let now = OffsetDateTime::now_utc();
        let created = Post {
            id: PostId(inner.next_post_id),
            title: post.title.clone(),
            content: post.content.clone(),
            tags: post.tags.clone(),
            user_id: post.user_id,
            version: 0,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
        };
        inner.posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: PostId) -> Result<Post, StoreError> {
        self.inner
            .lock()
            .await
            .posts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, post: &mut Post) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .posts
            .get_mut(&post.id)
            .filter(|stored| stored.version == post.version)
            .ok_or(StoreError::NotFound)?;

        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.version += 1;
        stored.updated_at = OffsetDateTime::now_utc();

        post.version = stored.version;
        post.updated_at = stored.updated_at;
        Ok(())
    }

    async fn delete(&self, id: PostId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.posts.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        inner.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self
            .inner
            .lock()
            .await
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }
}

#[async_trait]
impl FollowerStore for MemoryStore {
    async fn follow(&self, user: UserId, follower: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user) || !inner.users.contains_key(&follower) {
            return Err(StoreError::NotFound);
        }
        if !inner.followers.insert((user, follower)) {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn unfollow(&self, user: UserId, follower: UserId) -> Result<(), StoreError> {
        if self
            .inner
            .lock()
            .await
            .followers
            .remove(&(user, follower))
        {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
