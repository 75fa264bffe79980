//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub version: String,
    pub database: String,
}

/// Health check endpoint, behind the operational credential guard
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_status = match state.storage.health.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed to reach the database");
            "unhealthy"
        }
    };

    let overall_status = if db_status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        overall_status,
        Json(HealthResponse {
            status: if overall_status == StatusCode::OK {
                "available".to_string()
            } else {
                "degraded".to_string()
            },
            environment: state.config.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: db_status.to_string(),
        }),
    )
}
