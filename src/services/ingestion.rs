//! Snapshot ingestion: turns raw user records into appended snapshots.
//!
//! A bad record never fails the batch. Records without a derivable identity
//! are reported in `errors` and skipped; the rest are appended in one write.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::snapshot::{NewSnapshot, RawSnapshot, SnapshotSource};
use crate::services::normalizer::{self, SnapshotPayload};
use crate::services::{cache, snapshot_store};
use crate::AppState;

/// Response of an ingestion run.
#[derive(Debug, Serialize)]
pub struct IngestionResult {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<IngestionError>,
}

/// Error for a single record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    pub error: String,
}

/// Records split into identified ones and per-record errors.
#[derive(Debug, Default)]
pub struct Identified<'a> {
    pub records: Vec<(String, &'a Value)>,
    pub errors: Vec<IngestionError>,
}

/// Pull the `users` array out of a request body.
pub fn records_of(body: &Value) -> Result<&Vec<Value>, AppError> {
    body.get("users")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Validation("Missing users array".to_string()))
}

pub fn identify(records: &[Value]) -> Identified<'_> {
    let mut identified = Identified::default();
    for record in records {
        match normalizer::identity(record) {
            Some(user_id) => identified.records.push((user_id, record)),
            None => identified.errors.push(IngestionError {
                user_id: None,
                user: Some(record.clone()),
                error: "Missing userId".to_string(),
            }),
        }
    }
    identified
}

/// Build the snapshots to append.
///
/// `statusLastChanged` carries over from the user's previous snapshot unless
/// the status flipped, in which case it becomes `captured_at`. A missing
/// `createdDateTime` is taken from the previous snapshot. Values present on
/// the record itself are kept as sent.
pub fn build_snapshots(
    tenant_id: &str,
    records: &[(String, &Value)],
    captured_at: DateTime<Utc>,
    previous: &HashMap<String, RawSnapshot>,
) -> Vec<NewSnapshot> {
    records
        .iter()
        .map(|(user_id, record)| {
            let source = match SnapshotPayload::classify(record) {
                SnapshotPayload::Atlassian(_) => SnapshotSource::Atlassian,
                _ => SnapshotSource::Manual,
            };
            let status = normalizer::status(record);
            let prior = previous.get(user_id).map(normalizer::normalize);

            let status_last_changed = match &prior {
                Some(prior) if prior.status == status => prior.status_last_changed,
                _ => captured_at,
            };

            let mut payload = record.as_object().cloned().unwrap_or_default();
            payload
                .entry("status")
                .or_insert_with(|| Value::String(status.to_string()));
            payload
                .entry("statusLastChanged")
                .or_insert_with(|| Value::String(status_last_changed.to_rfc3339()));
            if let Some(created) = prior.as_ref().and_then(|p| p.created_at) {
                payload
                    .entry("createdDateTime")
                    .or_insert_with(|| Value::String(created.to_rfc3339()));
            }

            NewSnapshot {
                tenant_id: tenant_id.to_string(),
                user_id: user_id.clone(),
                captured_at,
                source,
                payload: Value::Object(payload),
            }
        })
        .collect()
}

/// Capture instant at the precision the store keeps.
pub fn capture_instant() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Ingest a batch of raw user records.
pub async fn ingest(state: &AppState, records: &[Value]) -> Result<IngestionResult, AppError> {
    let tenant_id = &state.config.tenant_id;
    let table = &state.config.tables.snapshots;
    let timestamp = capture_instant();

    let identified = identify(records);
    let user_ids: Vec<String> = identified.records.iter().map(|(id, _)| id.clone()).collect();

    let previous: HashMap<String, RawSnapshot> =
        snapshot_store::latest_for_users(&state.db, table, tenant_id, &user_ids)
            .await?
            .into_iter()
            .map(|snapshot| (snapshot.user_id.clone(), snapshot))
            .collect();

    let snapshots = build_snapshots(tenant_id, &identified.records, timestamp, &previous);
    let stored = snapshot_store::append(&state.db, table, &snapshots).await?;

    if stored > 0 {
        cache::invalidate(state.cache(), &cache::users_key(tenant_id)).await;
    }

    tracing::info!(
        tenant_id = %tenant_id,
        received = records.len(),
        stored,
        errors = identified.errors.len(),
        "Ingested user snapshots"
    );

    Ok(IngestionResult {
        message: format!("Stored {stored} user snapshots."),
        timestamp,
        errors: identified.errors,
    })
}
