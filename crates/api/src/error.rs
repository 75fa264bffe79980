//! API error types and handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde_json::json;
use socialnet_shared::StoreError;

use crate::auth::{basic::BASIC_CHALLENGE, AuthzError, JwtError, PasswordError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("unauthorized")]
    Unauthorized,
    #[error("unauthorized")]
    BasicUnauthorized,
    #[error("forbidden")]
    Forbidden,

    // Validation errors
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),

    // Resource errors
    #[error("resource not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("a user with that email already exists")]
    DuplicateEmail,
    #[error("a user with that username already exists")]
    DuplicateUsername,
    #[error("{0}")]
    Conflict(String),

    // Internal errors
    #[error("the server is busy, please try again")]
    Timeout,
    #[error("Misconfigured: {0}")]
    Misconfigured(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

const GENERIC_SERVER_ERROR: &str = "the server encountered a problem and could not process your request";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Authentication
            ApiError::Unauthorized | ApiError::BasicUnauthorized => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),

            // Validation
            ApiError::Validation(msg) | ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string()),
            ApiError::DuplicateEmail | ApiError::DuplicateUsername => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),

            // Internal
            ApiError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Misconfigured(detail) => {
                tracing::error!(detail = %detail, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_SERVER_ERROR.to_string())
            }
            ApiError::Database(detail) | ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_SERVER_ERROR.to_string())
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();

        if matches!(self, ApiError::BasicUnauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }

        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::DuplicateUsername => ApiError::DuplicateUsername,
            StoreError::Conflict => ApiError::Conflict("resource already exists".to_string()),
            StoreError::Timeout => ApiError::Timeout,
            StoreError::MissingRole(name) => {
                ApiError::Misconfigured(format!("role `{}` is not configured", name))
            }
            StoreError::Delivery(detail) => ApiError::Internal(detail),
            err @ StoreError::Database(_) if err.is_retryable() => {
                tracing::warn!(error = %err, "Retryable storage failure");
                ApiError::Timeout
            }
            StoreError::Database(db_err) => ApiError::Database(db_err.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::UnknownRole(name) => {
                ApiError::Misconfigured(format!("role `{}` is not configured", name))
            }
            AuthzError::Store(e) => e.into(),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => ApiError::Validation(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Errors raised by tower middleware (the request deadline) rendered as JSON
pub async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request exceeded its deadline");
        ApiError::Timeout
    } else {
        ApiError::Internal(err.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
