//! Source syncs: pull from Graph or Atlassian and persist what was fetched.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::connectors::atlassian::AtlassianClient;
use crate::connectors::graph::GraphClient;
use crate::errors::AppError;
use crate::models::snapshot::{NewSnapshot, SnapshotSource};
use crate::services::ingestion::capture_instant;
use crate::services::{atlassian, cache, sku, snapshot_store};
use crate::AppState;

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub source: SnapshotSource,
    pub message: String,
    pub count: usize,
    pub skipped: usize,
}

/// Wrap Graph users into snapshot envelopes. Users without an id are skipped.
pub fn graph_snapshots(
    tenant_id: &str,
    users: Vec<Value>,
    captured_at: chrono::DateTime<Utc>,
) -> (Vec<NewSnapshot>, usize) {
    let mut skipped = 0;
    let snapshots = users
        .into_iter()
        .filter_map(|user| {
            let Some(user_id) = user.get("id").and_then(Value::as_str).map(str::to_string) else {
                skipped += 1;
                return None;
            };
            Some(NewSnapshot {
                tenant_id: tenant_id.to_string(),
                payload: json!({
                    "userId": user_id,
                    "tenantId": tenant_id,
                    "timestamp": captured_at,
                    "graphData": user,
                }),
                user_id,
                captured_at,
                source: SnapshotSource::Graph,
            })
        })
        .collect();
    (snapshots, skipped)
}

/// Pull every Graph user into the snapshot log and refresh tenant SKUs.
pub async fn sync_graph(state: &AppState) -> Result<SyncSummary, AppError> {
    let settings = state.config.graph.get()?;
    let tenant_id = &state.config.tenant_id;
    let client = GraphClient::new(settings.clone(), tenant_id.clone())?;

    let users = client.fetch_users().await?;
    let captured_at = capture_instant();
    let (snapshots, skipped) = graph_snapshots(tenant_id, users, captured_at);
    let stored =
        snapshot_store::append(&state.db, &state.config.tables.snapshots, &snapshots).await?;

    // SKU names only feed display names; a failure here does not fail the sync.
    match client.fetch_subscribed_skus().await {
        Ok(raw) => {
            let skus: Vec<_> = raw
                .iter()
                .filter_map(|r| sku::tenant_sku_from_graph(tenant_id, r))
                .collect();
            sku::upsert_tenant_skus(&state.db, &state.config.tables.skus, &skus).await?;
        }
        Err(e) => tracing::warn!(tenant_id = %tenant_id, error = %e, "Subscribed SKU sync failed"),
    }

    cache::invalidate(state.cache(), &cache::users_key(tenant_id)).await;
    tracing::info!(tenant_id = %tenant_id, count = stored, skipped, "Graph sync complete");

    Ok(SyncSummary {
        source: SnapshotSource::Graph,
        message: format!("Stored {stored} user snapshots at {}", captured_at.to_rfc3339()),
        count: stored as usize,
        skipped,
    })
}

pub async fn sync_atlassian_users(state: &AppState) -> Result<SyncSummary, AppError> {
    let client = AtlassianClient::new(state.config.atlassian.get()?.clone())?;
    let raw = client.fetch_users().await?;
    if raw.is_empty() {
        return Err(AppError::Upstream("No Atlassian users found".to_string()));
    }

    let synced_at = Utc::now();
    let tenant_id = &state.config.tenant_id;
    let users: Vec<_> = raw
        .iter()
        .filter_map(|r| atlassian::user_from_raw(tenant_id, r, synced_at))
        .collect();
    let skipped = raw.len() - users.len();
    let count =
        atlassian::upsert_users(&state.db, &state.config.tables.atlassian_users, &users).await?;

    tracing::info!(tenant_id = %tenant_id, count, skipped, "Atlassian user sync complete");
    Ok(SyncSummary {
        source: SnapshotSource::Atlassian,
        message: "Atlassian users synced".to_string(),
        count,
        skipped,
    })
}

pub async fn sync_atlassian_licenses(state: &AppState) -> Result<SyncSummary, AppError> {
    let client = AtlassianClient::new(state.config.atlassian.get()?.clone())?;
    let raw = client.fetch_products().await?;
    if raw.is_empty() {
        return Err(AppError::Upstream("No Atlassian products found".to_string()));
    }

    let synced_at = Utc::now();
    let tenant_id = &state.config.tenant_id;
    let products: Vec<_> = raw
        .iter()
        .filter_map(|r| atlassian::product_from_raw(tenant_id, r, synced_at))
        .collect();
    let skipped = raw.len() - products.len();
    let count = atlassian::upsert_products(
        &state.db,
        &state.config.tables.atlassian_licenses,
        &products,
    )
    .await?;

    tracing::info!(tenant_id = %tenant_id, count, skipped, "Atlassian license sync complete");
    Ok(SyncSummary {
        source: SnapshotSource::Atlassian,
        message: "Atlassian licenses synced".to_string(),
        count,
        skipped,
    })
}

/// Run the Graph sync on a fixed interval.
///
/// Returns `None` when the interval is zero or Graph is not configured.
pub fn spawn_scheduler(state: AppState) -> Option<JoinHandle<()>> {
    let interval_secs = state.config.sync_interval_secs;
    if interval_secs == 0 {
        tracing::info!("Scheduled Graph sync disabled");
        return None;
    }
    if let Err(e) = state.config.graph.get() {
        tracing::info!(reason = %e, "Scheduled Graph sync not started");
        return None;
    }

    tracing::info!(interval_secs, "Starting scheduled Graph sync");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sync_graph(&state).await {
                Ok(summary) => {
                    tracing::debug!(count = summary.count, "Scheduled Graph sync finished")
                }
                Err(e) => tracing::error!(error = %e, "Scheduled Graph sync failed"),
            }
        }
    }))
}
