//! Postgres-backed Content Store
//!
//! Every statement runs under the configured per-operation deadline. Multi
//! statement operations share one transaction; any early return drops the
//! transaction, which rolls it back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use socialnet_shared::{
    Comment, NewPost, NewUser, PendingInvitation, Post, PostId, Role, StoreError, User, UserId,
};
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;

use super::{
    CommentStore, FollowerStore, HealthProbe, InviteDelivery, PostStore, RoleStore, UserStore,
};

const USER_COLUMNS: &str = r#"
    SELECT u.id, u.username, u.email, u.password, u.is_active, u.created_at,
           r.id AS role_id, r.name AS role_name, r.description AS role_description,
           r.level AS role_level
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password: String,
    is_active: bool,
    created_at: OffsetDateTime,
    role_id: i64,
    role_name: String,
    role_description: String,
    role_level: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password,
            is_active: row.is_active,
            role: Role {
                id: row.role_id,
                name: row.role_name,
                description: row.role_description,
                level: row.role_level,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    tags: Vec<String>,
    user_id: i64,
    version: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: PostId(row.id),
            title: row.title,
            content: row.content,
            tags: row.tags,
            user_id: UserId(row.user_id),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Run one storage step under the per-operation deadline
    async fn bounded<T, F>(&self, step: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, step).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }

    async fn fetch_user(&self, conn: &mut PgConnection, id: UserId) -> Result<User, StoreError> {
        let sql = format!("{USER_COLUMNS} WHERE u.id = $1");
        let row: UserRow = self
            .bounded(sqlx::query_as(&sql).bind(id).fetch_one(&mut *conn))
            .await?;
        Ok(row.into())
    }

    /// Insert the inactive user row.
    ///
    /// Email is checked before username so a collision on both is reported
    /// as a duplicate email. The unique constraints still back this up.
    async fn insert_user(
        &self,
        conn: &mut PgConnection,
        user: &NewUser,
    ) -> Result<User, StoreError> {
        let (email_taken,): (bool,) = self
            .bounded(
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                    .bind(&user.email)
                    .fetch_one(&mut *conn),
            )
            .await?;
        if email_taken {
            return Err(StoreError::DuplicateEmail);
        }

        let (username_taken,): (bool,) = self
            .bounded(
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                    .bind(&user.username)
                    .fetch_one(&mut *conn),
            )
            .await?;
        if username_taken {
            return Err(StoreError::DuplicateUsername);
        }

        let role: Role = self
            .bounded(
                sqlx::query_as("SELECT id, name, description, level FROM roles WHERE name = $1")
                    .bind(&user.role_name)
                    .fetch_optional(&mut *conn),
            )
            .await?
            .ok_or_else(|| StoreError::MissingRole(user.role_name.clone()))?;

        let (id, created_at): (i64, OffsetDateTime) = self
            .bounded(
                sqlx::query_as(
                    r#"
                    INSERT INTO users (username, email, password, is_active, role_id)
                    VALUES ($1, $2, $3, FALSE, $4)
                    RETURNING id, created_at
                    "#,
                )
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(role.id)
                .fetch_one(&mut *conn),
            )
            .await?;

        Ok(User {
            id: UserId(id),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            is_active: false,
            role,
            created_at,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let sql = format!("{USER_COLUMNS} WHERE u.id = $1");
        let row: UserRow = self
            .bounded(sqlx::query_as(&sql).bind(id).fetch_one(&self.pool))
            .await?;
        Ok(row.into())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let sql = format!("{USER_COLUMNS} WHERE u.email = $1 AND u.is_active = TRUE");
        let row: UserRow = self
            .bounded(sqlx::query_as(&sql).bind(email).fetch_one(&self.pool))
            .await?;
        Ok(row.into())
    }

    async fn create_and_invite(
        &self,
        user: &NewUser,
        invitation: &PendingInvitation,
        delivery: &dyn InviteDelivery,
    ) -> Result<User, StoreError> {
        let mut tx = self.bounded(self.pool.begin()).await?;

        let created = self.insert_user(&mut tx, user).await?;

        self.bounded(
            sqlx::query(
                "INSERT INTO user_invitations (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
            )
            .bind(&invitation.token_hash)
            .bind(created.id)
            .bind(invitation.expires_at)
            .execute(&mut *tx),
        )
        .await?;

        delivery
            .deliver(&created)
            .await
            .map_err(|e| StoreError::Delivery(e.to_string()))?;

        self.bounded(tx.commit()).await?;

        tracing::info!(user_id = %created.id, "Created pending user");
        Ok(created)
    }

    async fn activate(&self, token_hash: &str, now: OffsetDateTime) -> Result<User, StoreError> {
        let mut tx = self.bounded(self.pool.begin()).await?;

        // Row lock keeps a concurrent activation of the same token out.
        let (user_id,): (i64,) = self
            .bounded(
                sqlx::query_as(
                    r#"
                    SELECT user_id FROM user_invitations
                    WHERE token_hash = $1 AND expires_at > $2
                    FOR UPDATE
                    "#,
                )
                .bind(token_hash)
                .bind(now)
                .fetch_optional(&mut *tx),
            )
            .await?
            .ok_or(StoreError::NotFound)?;
        let user_id = UserId(user_id);

        self.bounded(
            sqlx::query("UPDATE users SET is_active = TRUE WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx),
        )
        .await?;

        self.bounded(
            sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx),
        )
        .await?;

        let user = self.fetch_user(&mut tx, user_id).await?;

        self.bounded(tx.commit()).await?;

        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut tx = self.bounded(self.pool.begin()).await?;

        self.bounded(
            sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx),
        )
        .await?;

        let deleted = self
            .bounded(
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx),
            )
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.bounded(tx.commit()).await?;

        Ok(())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError> {
        self.bounded(
            sqlx::query_as("SELECT id, name, description, level FROM roles WHERE name = $1")
                .bind(name)
                .fetch_one(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn create(&self, post: &NewPost) -> Result<Post, StoreError> {
        let row: PostRow = self
            .bounded(
                sqlx::query_as(
                    r#"
                    INSERT INTO posts (title, content, tags, user_id)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, title, content, tags, user_id, version, created_at, updated_at
                    "#,
                )
                .bind(&post.title)
                .bind(&post.content)
                .bind(&post.tags)
                .bind(post.user_id)
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn get_by_id(&self, id: PostId) -> Result<Post, StoreError> {
        let row: PostRow = self
            .bounded(
                sqlx::query_as(
                    r#"
                    SELECT id, title, content, tags, user_id, version, created_at, updated_at
                    FROM posts WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn update(&self, post: &mut Post) -> Result<(), StoreError> {
        let (version, updated_at): (i32, OffsetDateTime) = self
            .bounded(
                sqlx::query_as(
                    r#"
                    UPDATE posts
                    SET title = $1, content = $2, version = version + 1, updated_at = NOW()
                    WHERE id = $3 AND version = $4
                    RETURNING version, updated_at
                    "#,
                )
                .bind(&post.title)
                .bind(&post.content)
                .bind(post.id)
                .bind(post.version)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound)?;

        post.version = version;
        post.updated_at = updated_at;
        Ok(())
    }

    async fn delete(&self, id: PostId) -> Result<(), StoreError> {
        let deleted = self
            .bounded(
                sqlx::query("DELETE FROM posts WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn get_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        self.bounded(
            sqlx::query_as(
                r#"
                SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                FROM comments c
                JOIN users u ON u.id = c.user_id
                WHERE c.post_id = $1
                ORDER BY c.created_at DESC
                "#,
            )
            .bind(post_id)
            .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl FollowerStore for PgStore {
    async fn follow(&self, user: UserId, follower: UserId) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query("INSERT INTO followers (user_id, follower_id) VALUES ($1, $2)")
                .bind(user)
                .bind(follower)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn unfollow(&self, user: UserId, follower: UserId) -> Result<(), StoreError> {
        let deleted = self
            .bounded(
                sqlx::query("DELETE FROM followers WHERE user_id = $1 AND follower_id = $2")
                    .bind(user)
                    .bind(follower)
                    .execute(&self.pool),
            )
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }
}
