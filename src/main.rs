use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use seatscope::config::AppConfig;
use seatscope::services::cache::{RedisCache, SnapshotCache};
use seatscope::services::{sku, sync};
use seatscope::{db, routes, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatscope=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cache: Option<Arc<dyn SnapshotCache>> = match config.redis_url.as_deref() {
        None => {
            tracing::info!("REDIS_URL not set, caching disabled");
            None
        }
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, continuing without cache");
                None
            }
        },
    };

    let catalog = sku::load_catalog(config.sku_catalog_path.as_deref())
        .context("Failed to load SKU catalog")?;
    tracing::info!(skus = catalog.len(), "Loaded SKU catalog");

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        db: pool,
        config,
        cache,
        catalog: Arc::new(catalog),
    };

    let _scheduler = sync::spawn_scheduler(state.clone());

    let app = routes::build_router(state);

    tracing::info!(host = %addr, "Starting Seatscope API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
