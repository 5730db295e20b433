//! Stored Atlassian directory records.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::atlassian::{AtlassianProduct, AtlassianUser};
use crate::services::atlassian as atlassian_service;
use crate::AppState;

/// GET /api/v1/atlassian/users
pub async fn users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AtlassianUser>>>, AppError> {
    let users = atlassian_service::list_users(
        &state.db,
        &state.config.tables.atlassian_users,
        &state.config.tenant_id,
    )
    .await?;
    Ok(ApiResponse::success(users))
}

/// GET /api/v1/atlassian/licenses
pub async fn licenses(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AtlassianProduct>>>, AppError> {
    let products = atlassian_service::list_products(
        &state.db,
        &state.config.tables.atlassian_licenses,
        &state.config.tenant_id,
    )
    .await?;
    Ok(ApiResponse::success(products))
}
