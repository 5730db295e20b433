//! SKU catalog loading and the tenant SKU table.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::sku::{SkuCatalog, SkuPrice, TenantSku};

#[derive(Debug, Deserialize)]
struct CatalogRow {
    sku_id: String,
    display_name: String,
    monthly_cost: f64,
}

/// Parse a `sku_id,display_name,monthly_cost` CSV. Malformed rows are skipped.
pub fn parse_catalog<R: std::io::Read>(reader: R) -> Result<SkuCatalog, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut prices = Vec::new();
    for (idx, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
        match row {
            Ok(row) if !row.sku_id.is_empty() && row.monthly_cost >= 0.0 => prices.push(SkuPrice {
                sku_id: row.sku_id,
                display_name: row.display_name,
                monthly_cost: row.monthly_cost,
            }),
            Ok(row) => {
                tracing::warn!(row = idx + 2, sku_id = %row.sku_id, "Skipping invalid catalog row");
            }
            Err(e) => {
                tracing::warn!(row = idx + 2, error = %e, "Skipping malformed catalog row");
            }
        }
    }

    if prices.is_empty() {
        return Err(AppError::Validation(
            "SKU catalog contains no valid rows".to_string(),
        ));
    }
    Ok(SkuCatalog::new(prices))
}

/// Catalog from `path`, or the built-in price list when no path is configured.
pub fn load_catalog(path: Option<&str>) -> Result<SkuCatalog, AppError> {
    let Some(path) = path else {
        return Ok(SkuCatalog::builtin());
    };
    let file = std::fs::File::open(Path::new(path))
        .map_err(|e| AppError::Internal(format!("Cannot open SKU catalog {path}: {e}")))?;
    let catalog = parse_catalog(file)?;
    tracing::info!(path, count = catalog.len(), "Loaded SKU catalog");
    Ok(catalog)
}

/// Map a Graph `subscribedSku` record onto a [`TenantSku`].
pub fn tenant_sku_from_graph(tenant_id: &str, raw: &Value) -> Option<TenantSku> {
    let sku_id = raw.get("skuId").and_then(Value::as_str)?.to_string();
    let sku_part_number = raw
        .get("skuPartNumber")
        .and_then(Value::as_str)
        .map(str::to_string);
    let display_name = raw
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| sku_part_number.clone());
    let prepaid_units = raw
        .pointer("/prepaidUnits/enabled")
        .and_then(Value::as_i64)
        .unwrap_or(0) as i32;

    Some(TenantSku {
        tenant_id: tenant_id.to_string(),
        sku_id,
        sku_part_number,
        display_name,
        prepaid_units,
        synced_at: Utc::now(),
    })
}

pub async fn upsert_tenant_skus(pool: &PgPool, table: &str, skus: &[TenantSku]) -> Result<usize, AppError> {
    let query = format!(
        r#"
        INSERT INTO {table} (tenant_id, sku_id, sku_part_number, display_name, prepaid_units, synced_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (tenant_id, sku_id) DO UPDATE SET
            sku_part_number = EXCLUDED.sku_part_number,
            display_name = EXCLUDED.display_name,
            prepaid_units = EXCLUDED.prepaid_units,
            synced_at = EXCLUDED.synced_at
        "#
    );

    let mut tx = pool.begin().await?;
    for sku in skus {
        sqlx::query(&query)
            .bind(&sku.tenant_id)
            .bind(&sku.sku_id)
            .bind(&sku.sku_part_number)
            .bind(&sku.display_name)
            .bind(sku.prepaid_units)
            .bind(sku.synced_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(skus.len())
}

pub async fn list_tenant_skus(pool: &PgPool, table: &str, tenant_id: &str) -> Result<Vec<TenantSku>, AppError> {
    let skus = sqlx::query_as::<_, TenantSku>(&format!(
        "SELECT tenant_id, sku_id, sku_part_number, display_name, prepaid_units, synced_at \
         FROM {table} WHERE tenant_id = $1 ORDER BY sku_id"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(skus)
}
