//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the database

use crate::errors::ApiError;
use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the database answers, 503 otherwise. The identity provider
/// is not probed; its keys are fetched on demand.
///
/// # Errors
///
/// Returns `ApiError::ServiceUnavailable` if the database ping fails.
#[tracing::instrument(skip_all, name = "ra.health.readiness")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, ApiError> {
    sqlx::query("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| {
            tracing::warn!(target: "ra.health", error = %e, "Readiness check failed: database error");
            ApiError::ServiceUnavailable("database unreachable".to_string())
        })?;

    Ok(Json(ReadinessResponse {
        status: "ready",
        database: "healthy",
    }))
}
