//! Optional read-through cache for derived user sets.
//!
//! The cache is never the source of truth: every failure is logged and the
//! caller recomputes from the snapshot log.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Key/value cache with per-entry expiry.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Key of the cached latest-user set of a tenant.
pub fn users_key(tenant_id: &str) -> String {
    format!("users_all_{tenant_id}")
}

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SnapshotCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Serve `key` from the cache, or compute it and fill the cache on success.
pub async fn read_through<T, F, Fut>(
    cache: Option<&dyn SnapshotCache>,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let Some(cache) = cache else {
        return compute().await;
    };

    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }
            Err(e) => tracing::warn!(key, error = %e, "Discarding unreadable cache entry"),
        },
        Ok(None) => tracing::debug!(key, "Cache miss"),
        Err(e) => tracing::warn!(key, error = %e, "Cache unavailable, recomputing"),
    }

    let value = compute().await?;
    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(e) = cache.set(key, &raw, ttl).await {
                tracing::warn!(key, error = %e, "Failed to fill cache");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
    }
    Ok(value)
}

/// Drop `key`; failures are logged only.
pub async fn invalidate(cache: Option<&dyn SnapshotCache>, key: &str) {
    let Some(cache) = cache else {
        return;
    };
    match cache.invalidate(key).await {
        Ok(()) => tracing::debug!(key, "Cache invalidated"),
        Err(e) => tracing::warn!(key, error = %e, "Failed to invalidate cache"),
    }
}
