pub mod config;
pub mod connectors;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use crate::models::sku::SkuCatalog;
use crate::services::cache::SnapshotCache;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub cache: Option<Arc<dyn SnapshotCache>>,
    pub catalog: Arc<SkuCatalog>,
}

impl AppState {
    pub fn cache(&self) -> Option<&dyn SnapshotCache> {
        self.cache.as_deref()
    }
}
