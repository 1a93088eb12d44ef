//! Best-effort key/value sink recording delivery receipts.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::CacheError;

/// Key/value sink written after a successful delivery.
///
/// Failures are reported to the caller, which logs and moves on; a cache
/// outage never changes the outcome of a delivery.
#[async_trait]
pub trait CacheSink: Send + Sync {
    /// Store `value` under `key`. A zero `ttl` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed sink over an auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to a Redis server (`redis://` or `rediss://`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Redis connected: {url}");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheSink for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, value).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Other(format!("unexpected PING reply: {pong}")))
        }
    }
}
