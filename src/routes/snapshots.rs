//! Snapshot routes: history with trends, and ingestion.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::config::MAX_DAYS;
use crate::errors::{ApiResponse, AppError};
use crate::services::ingestion::{self, IngestionResult};
use crate::services::users::{self as user_service, SnapshotHistory};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<String>,
}

/// Parse `days` in `1..=MAX_DAYS`, falling back to the configured window.
pub fn parse_days(raw: Option<&str>, default: i64) -> Result<i64, AppError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(days) if (1..=MAX_DAYS).contains(&days) => Ok(days),
            _ => Err(AppError::Validation(format!(
                "days must be an integer between 1 and {MAX_DAYS}, got '{raw}'"
            ))),
        },
    }
}

/// GET /api/v1/snapshots: daily latest snapshots and trends over a trailing window.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<SnapshotHistory>>, AppError> {
    let days = parse_days(query.days.as_deref(), state.config.snapshot_window_days)?;
    let result = user_service::history(&state, days).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/snapshots: append one snapshot per identifiable record.
pub async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<IngestionResult>>, AppError> {
    let Json(body) = body?;
    let records = ingestion::records_of(&body)?;
    let result = ingestion::ingest(&state, records).await?;
    Ok(ApiResponse::success(result))
}
