//! Append-only snapshot log in PostgreSQL.
//!
//! The table name comes from configuration and is validated as a SQL
//! identifier at startup before it is interpolated into queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::AppError;
use crate::models::snapshot::{NewSnapshot, RawSnapshot};

/// Rows per INSERT statement; six binds per row stays well under the
/// PostgreSQL limit of 65535 parameters.
const INSERT_CHUNK: usize = 1000;

const COLUMNS: &str = "id, tenant_id, user_id, captured_at, source, payload";

/// Append snapshots with one multi-row insert per chunk.
///
/// A row colliding on `(tenant_id, user_id, captured_at)` replaces the
/// stored payload. Within one call the last snapshot for a key wins.
pub async fn append(pool: &PgPool, table: &str, snapshots: &[NewSnapshot]) -> Result<u64, AppError> {
    let mut by_key: HashMap<(&str, &str, DateTime<Utc>), usize> = HashMap::new();
    for (idx, snapshot) in snapshots.iter().enumerate() {
        by_key.insert(
            (
                snapshot.tenant_id.as_str(),
                snapshot.user_id.as_str(),
                snapshot.captured_at,
            ),
            idx,
        );
    }
    let mut keep: Vec<usize> = by_key.into_values().collect();
    keep.sort_unstable();
    let rows: Vec<&NewSnapshot> = keep.into_iter().map(|idx| &snapshots[idx]).collect();

    let mut written = 0u64;
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {table} ({COLUMNS}) "));
        builder.push_values(chunk, |mut row, snapshot| {
            row.push_bind(snapshot.id())
                .push_bind(&snapshot.tenant_id)
                .push_bind(&snapshot.user_id)
                .push_bind(snapshot.captured_at)
                .push_bind(snapshot.source)
                .push_bind(&snapshot.payload);
        });
        builder.push(
            " ON CONFLICT (tenant_id, user_id, captured_at) \
             DO UPDATE SET payload = EXCLUDED.payload, source = EXCLUDED.source",
        );
        written += builder.build().execute(pool).await?.rows_affected();
    }

    tracing::debug!(table, count = written, "Appended snapshots");
    Ok(written)
}

/// Most recent stored snapshot of each of `user_ids`, in one query.
pub async fn latest_for_users(
    pool: &PgPool,
    table: &str,
    tenant_id: &str,
    user_ids: &[String],
) -> Result<Vec<RawSnapshot>, AppError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let snapshots = sqlx::query_as::<_, RawSnapshot>(&format!(
        r#"
        SELECT DISTINCT ON (user_id) {COLUMNS}
        FROM {table}
        WHERE tenant_id = $1 AND user_id = ANY($2)
        ORDER BY user_id, captured_at DESC
        "#
    ))
    .bind(tenant_id)
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(snapshots)
}

/// Every snapshot of a tenant captured up to `until`, in one query.
pub async fn list(
    pool: &PgPool,
    table: &str,
    tenant_id: &str,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<RawSnapshot>, AppError> {
    let snapshots = sqlx::query_as::<_, RawSnapshot>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM {table}
        WHERE tenant_id = $1
          AND ($2::timestamptz IS NULL OR captured_at <= $2)
        ORDER BY user_id, captured_at
        "#
    ))
    .bind(tenant_id)
    .bind(until)
    .fetch_all(pool)
    .await?;

    tracing::debug!(tenant_id, count = snapshots.len(), "Loaded snapshot log");
    Ok(snapshots)
}
