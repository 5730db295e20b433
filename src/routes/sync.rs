//! Manual sync triggers.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::services::sync::{self as sync_service, SyncSummary};
use crate::AppState;

/// POST /api/v1/sync/graph
pub async fn graph(State(state): State<AppState>) -> Result<Json<ApiResponse<SyncSummary>>, AppError> {
    let summary = sync_service::sync_graph(&state).await?;
    Ok(ApiResponse::success(summary))
}

/// POST /api/v1/sync/atlassian/users
pub async fn atlassian_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SyncSummary>>, AppError> {
    let summary = sync_service::sync_atlassian_users(&state).await?;
    Ok(ApiResponse::success(summary))
}

/// POST /api/v1/sync/atlassian/licenses
pub async fn atlassian_licenses(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SyncSummary>>, AppError> {
    let summary = sync_service::sync_atlassian_licenses(&state).await?;
    Ok(ApiResponse::success(summary))
}
