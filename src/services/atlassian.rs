//! Current-state Atlassian users and product seats.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::atlassian::{AtlassianProduct, AtlassianUser};

fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn user_from_raw(tenant_id: &str, raw: &Value, synced_at: DateTime<Utc>) -> Option<AtlassianUser> {
    let account_id = text(raw, &["account_id", "id"])?;
    let is_active = raw.get("active").and_then(Value::as_bool) == Some(true)
        || raw
            .get("account_status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("active"));

    Some(AtlassianUser {
        tenant_id: tenant_id.to_string(),
        account_id,
        display_name: text(raw, &["display_name", "name"]),
        email: text(raw, &["email"]),
        is_active,
        raw: raw.clone(),
        synced_at,
    })
}

pub fn product_from_raw(
    tenant_id: &str,
    raw: &Value,
    synced_at: DateTime<Utc>,
) -> Option<AtlassianProduct> {
    let seats = |field: &str| {
        raw.pointer(&format!("/seats/{field}"))
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32
    };
    Some(AtlassianProduct {
        tenant_id: tenant_id.to_string(),
        product_id: text(raw, &["product_id", "id"])?,
        product_name: text(raw, &["product_name", "name"]),
        product_key: text(raw, &["product_key", "key"]),
        seats_used: seats("used"),
        seat_count: seats("total"),
        raw: raw.clone(),
        synced_at,
    })
}

pub async fn upsert_users(pool: &PgPool, table: &str, users: &[AtlassianUser]) -> Result<usize, AppError> {
    let query = format!(
        r#"
        INSERT INTO {table} (tenant_id, account_id, display_name, email, is_active, raw, synced_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (tenant_id, account_id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            email = EXCLUDED.email,
            is_active = EXCLUDED.is_active,
            raw = EXCLUDED.raw,
            synced_at = EXCLUDED.synced_at
        "#
    );

    let mut tx = pool.begin().await?;
    for user in users {
        sqlx::query(&query)
            .bind(&user.tenant_id)
            .bind(&user.account_id)
            .bind(&user.display_name)
            .bind(&user.email)
            .bind(user.is_active)
            .bind(&user.raw)
            .bind(user.synced_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(users.len())
}

pub async fn upsert_products(
    pool: &PgPool,
    table: &str,
    products: &[AtlassianProduct],
) -> Result<usize, AppError> {
    let query = format!(
        r#"
        INSERT INTO {table} (tenant_id, product_id, product_name, product_key, seats_used, seat_count, raw, synced_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (tenant_id, product_id) DO UPDATE SET
            product_name = EXCLUDED.product_name,
            product_key = EXCLUDED.product_key,
            seats_used = EXCLUDED.seats_used,
            seat_count = EXCLUDED.seat_count,
            raw = EXCLUDED.raw,
            synced_at = EXCLUDED.synced_at
        "#
    );

    let mut tx = pool.begin().await?;
    for product in products {
        sqlx::query(&query)
            .bind(&product.tenant_id)
            .bind(&product.product_id)
            .bind(&product.product_name)
            .bind(&product.product_key)
            .bind(product.seats_used)
            .bind(product.seat_count)
            .bind(&product.raw)
            .bind(product.synced_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(products.len())
}

pub async fn list_users(pool: &PgPool, table: &str, tenant_id: &str) -> Result<Vec<AtlassianUser>, AppError> {
    let users = sqlx::query_as::<_, AtlassianUser>(&format!(
        "SELECT tenant_id, account_id, display_name, email, is_active, raw, synced_at \
         FROM {table} WHERE tenant_id = $1 ORDER BY display_name NULLS LAST, account_id"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn list_products(
    pool: &PgPool,
    table: &str,
    tenant_id: &str,
) -> Result<Vec<AtlassianProduct>, AppError> {
    let products = sqlx::query_as::<_, AtlassianProduct>(&format!(
        "SELECT tenant_id, product_id, product_name, product_key, seats_used, seat_count, raw, synced_at \
         FROM {table} WHERE tenant_id = $1 ORDER BY product_name NULLS LAST, product_id"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_user_fields() {
        let now = Utc::now();
        let raw = json!({
            "account_id": "acc-1",
            "name": "Grace Hopper",
            "email": "grace@corp.io",
            "account_status": "active"
        });
        let user = user_from_raw("t1", &raw, now).unwrap();
        assert_eq!(user.account_id, "acc-1");
        assert_eq!(user.display_name.as_deref(), Some("Grace Hopper"));
        assert!(user.is_active);
        assert_eq!(user.raw, raw);

        let closed = json!({ "account_id": "acc-2", "account_status": "closed" });
        assert!(!user_from_raw("t1", &closed, now).unwrap().is_active);
        assert!(user_from_raw("t1", &json!({ "email": "x@y.z" }), now).is_none());
    }

    #[test]
    fn maps_product_seats() {
        let raw = json!({
            "product_id": "jira",
            "product_name": "Jira Software",
            "product_key": "jira-software",
            "seats": { "used": 42, "total": 50 }
        });
        let product = product_from_raw("t1", &raw, Utc::now()).unwrap();
        assert_eq!(product.seats_used, 42);
        assert_eq!(product.seat_count, 50);
        assert_eq!(product.unused_seats(), 8);

        let no_seats = product_from_raw("t1", &json!({ "product_id": "conf" }), Utc::now()).unwrap();
        assert_eq!(no_seats.seat_count, 0);
    }
}
