//! Health check endpoints for liveness and readiness probes.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::ApiResponse;
use crate::AppState;

/// Readiness probe detail.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub cache: String,
}

/// Liveness probe: OK while the process is running.
pub async fn live() -> &'static str {
    "OK"
}

/// Readiness probe: checks database and cache connectivity.
pub async fn ready(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            format!("error: {e}")
        }
    };

    let cache = match state.cache() {
        None => "disabled".to_string(),
        Some(cache) => match cache.ping().await {
            Ok(()) => "connected".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Cache health check failed");
                format!("error: {e}")
            }
        },
    };

    ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        database,
        cache,
    })
}
