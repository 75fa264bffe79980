//! Storage error taxonomy

use thiserror::Error;

/// Unique constraint guarding `users.email`
pub const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";
/// Unique constraint guarding `users.username`
pub const USERS_USERNAME_CONSTRAINT: &str = "users_username_key";

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors surfaced by Content Store implementations.
///
/// Raw driver errors are classified here so that unique violations never
/// reach callers as driver text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("Email already in use")]
    DuplicateEmail,
    #[error("Username already in use")]
    DuplicateUsername,
    #[error("Resource already exists")]
    Conflict,
    #[error("Storage operation timed out")]
    Timeout,
    #[error("Role not configured: {0}")]
    MissingRole(String),
    #[error("Invitation delivery failed: {0}")]
    Delivery(String),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                match db_err.constraint() {
                    Some(USERS_EMAIL_CONSTRAINT) => StoreError::DuplicateEmail,
                    Some(USERS_USERNAME_CONSTRAINT) => StoreError::DuplicateUsername,
                    _ => StoreError::Conflict,
                }
            }
            // A referenced row (user, post) vanished or never existed.
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_FOREIGN_KEY_VIOLATION) =>
            {
                StoreError::NotFound
            }
            other => StoreError::Database(other),
        }
    }
}
