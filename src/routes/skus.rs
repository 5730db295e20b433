use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::sku::TenantSku;
use crate::services::sku as sku_service;
use crate::AppState;

/// GET /api/v1/skus: subscribed SKUs recorded by the last Graph sync.
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TenantSku>>>, AppError> {
    let skus =
        sku_service::list_tenant_skus(&state.db, &state.config.tables.skus, &state.config.tenant_id)
            .await?;
    Ok(ApiResponse::success(skus))
}
