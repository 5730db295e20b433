//! Cost and waste analytics routes.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::services::analytics::CostSummary;
use crate::services::users as user_service;
use crate::AppState;

/// GET /api/v1/analytics/costs: organization KPIs and the SKU table.
pub async fn costs(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CostSummary>>, AppError> {
    let summary = user_service::cost_summary(&state).await?;
    Ok(ApiResponse::success(summary))
}
