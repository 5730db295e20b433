//! Read-side views over the snapshot log: latest users, history, costs.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::pagination::{PageRequest, PagedUsers};
use crate::models::user::{CanonicalUser, DailyLatestSnapshot};
use crate::services::analytics::{self, CostSummary, SkuAnalytics, WastePolicy};
use crate::services::resolver::{self, TimeWindow};
use crate::services::trends::{self, TrendPoint};
use crate::services::{cache, sku, snapshot_store};
use crate::AppState;

/// Daily snapshots of a trailing window with their trend series.
#[derive(Debug, Serialize)]
pub struct SnapshotHistory {
    pub snapshots: Vec<DailyLatestSnapshot>,
    pub trends: Vec<TrendPoint>,
}

/// Latest state of every user of the tenant, through the cache when configured.
pub async fn latest_users(state: &AppState) -> Result<Vec<CanonicalUser>, AppError> {
    let tenant_id = &state.config.tenant_id;
    let ttl = Duration::from_secs(state.config.cache_ttl_secs);

    cache::read_through(state.cache(), &cache::users_key(tenant_id), ttl, || async {
        let log =
            snapshot_store::list(&state.db, &state.config.tables.snapshots, tenant_id, None).await?;
        let users = resolver::resolve(&log, None).latest;
        tracing::info!(
            tenant_id = %tenant_id,
            snapshots = log.len(),
            count = users.len(),
            "Resolved latest users"
        );
        Ok(users)
    })
    .await
}

fn waste_policy(state: &AppState) -> WastePolicy {
    WastePolicy::new(Utc::now(), state.config.waste_threshold_days)
}

/// One page of latest users plus the tenant-wide SKU table.
pub async fn list(
    state: &AppState,
    page: PageRequest,
) -> Result<PagedUsers<CanonicalUser, SkuAnalytics>, AppError> {
    let (users, tenant_skus) = tokio::try_join!(
        latest_users(state),
        sku::list_tenant_skus(&state.db, &state.config.tables.skus, &state.config.tenant_id),
    )?;

    let skus = analytics::sku_table(&users, &state.catalog, &tenant_skus, &waste_policy(state));

    Ok(PagedUsers {
        users: page.slice(&users),
        total_count: users.len(),
        skus,
    })
}

/// Daily latest snapshots and trends over the last `days` days.
pub async fn history(state: &AppState, days: i64) -> Result<SnapshotHistory, AppError> {
    let tenant_id = &state.config.tenant_id;
    let window = TimeWindow::trailing(Utc::now(), days)
        .ok_or_else(|| AppError::Validation(format!("days out of range: {days}")))?;

    // Not bounded below: the status clock needs the history before the window.
    let log = snapshot_store::list(
        &state.db,
        &state.config.tables.snapshots,
        tenant_id,
        Some(window.end),
    )
    .await?;
    let resolution = resolver::resolve(&log, Some(&window));
    let trends = trends::compute(&resolution.daily, window.first_day(), window.last_day());

    tracing::info!(
        tenant_id = %tenant_id,
        days,
        snapshots = resolution.daily.len(),
        users = resolution.latest.len(),
        "Computed snapshot history"
    );

    Ok(SnapshotHistory {
        snapshots: resolution.daily,
        trends,
    })
}

/// Organization KPIs and the SKU table.
pub async fn cost_summary(state: &AppState) -> Result<CostSummary, AppError> {
    let (users, tenant_skus) = tokio::try_join!(
        latest_users(state),
        sku::list_tenant_skus(&state.db, &state.config.tables.skus, &state.config.tenant_id),
    )?;
    Ok(analytics::summarize(
        &users,
        &state.catalog,
        &tenant_skus,
        &waste_policy(state),
    ))
}
