//! Seed script for development: loads a few weeks of sample snapshots.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` and `TENANT_ID` environment variables (reads .env).

use anyhow::Context;
use chrono::{Duration, DurationRound, Utc};
use seatscope::config::AppConfig;
use seatscope::models::snapshot::{NewSnapshot, SnapshotSource};
use seatscope::services::snapshot_store;
use serde_json::json;

const E5: &str = "06ebc4ee-1bb5-47dd-8120-11324bc54e06";
const BUSINESS_PREMIUM: &str = "cbdc14ab-d96c-4c30-b9f4-6ada7cdc1d46";
const VISIO: &str = "c5928f49-12ba-48f7-ada3-0d743a3601d5";

/// (user id, display name, department, licenses, days since last sign-in, active)
const SAMPLE_USERS: &[(&str, &str, &str, &[&str], i64, bool)] = &[
    ("seed-0001", "Ada Lovelace", "Finance", &[E5], 2, true),
    ("seed-0002", "Grace Hopper", "Engineering", &[E5, VISIO], 1, true),
    ("seed-0003", "Alan Turing", "Engineering", &[BUSINESS_PREMIUM], 140, true),
    ("seed-0004", "Katherine Johnson", "Programs", &[BUSINESS_PREMIUM], 95, true),
    ("seed-0005", "Edsger Dijkstra", "Operations", &[E5], 400, false),
    ("seed-0006", "Barbara Liskov", "Programs", &[], 10, true),
];

const SEED_DAYS: i64 = 21;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let pool = seatscope::db::create_pool(&config.database_url, 5).await?;

    // Run migrations first
    sqlx::migrate!("./migrations").run(&pool).await?;

    println!("=== Seatscope Seed Script ===");

    let today = Utc::now().duration_trunc(Duration::days(1))?;
    let mut snapshots = Vec::new();
    for day in (0..SEED_DAYS).rev() {
        let captured_at = today - Duration::days(day) + Duration::hours(6);
        for &(user_id, name, department, licenses, idle_days, active) in SAMPLE_USERS {
            // The last user joins a week before the end of the window.
            if user_id == "seed-0006" && day > 7 {
                continue;
            }
            let last_sign_in = today - Duration::days(idle_days);
            snapshots.push(NewSnapshot {
                tenant_id: config.tenant_id.clone(),
                user_id: user_id.to_string(),
                captured_at,
                source: SnapshotSource::Manual,
                payload: json!({
                    "id": user_id,
                    "displayName": name,
                    "mail": format!("{user_id}@example.org"),
                    "department": department,
                    "accountEnabled": active,
                    "createdDateTime": (today - Duration::days(SEED_DAYS + 30)).to_rfc3339(),
                    "lastSignInDateTime": last_sign_in.to_rfc3339(),
                    "assignedLicenses": licenses
                        .iter()
                        .map(|sku| json!({ "skuId": sku }))
                        .collect::<Vec<_>>(),
                }),
            });
        }
    }

    let stored = snapshot_store::append(&pool, &config.tables.snapshots, &snapshots).await?;
    println!("[done] Stored {stored} snapshots for tenant {}", config.tenant_id);

    println!("\n=== Seed complete! ===");
    Ok(())
}
