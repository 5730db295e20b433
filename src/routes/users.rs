//! User routes: latest state of every user, paginated.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PageQuery, PageRequest, PagedUsers};
use crate::models::user::CanonicalUser;
use crate::services::analytics::SkuAnalytics;
use crate::services::users as user_service;
use crate::AppState;

/// GET /api/v1/users: one page of latest users plus the tenant SKU table.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PagedUsers<CanonicalUser, SkuAnalytics>>>, AppError> {
    let page = PageRequest::parse(&query)?;
    let result = user_service::list(&state, page).await?;
    Ok(ApiResponse::success(result))
}
