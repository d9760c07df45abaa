//! # Seatflow Redis
//!
//! Redis implementation of [`KeyValueStore`], backing the windowed counters,
//! suspension registry and offer cache.
//!
//! # Atomicity
//!
//! Every combined operation (increment + expire, field write + expire,
//! delete + rewrite + expire) runs as one `MULTI/EXEC` pipeline. Concurrent
//! callers therefore never observe a counter without its TTL or a half
//! replaced offer table.
//!
//! # Example
//!
//! ```no_run
//! use seatflow_core::counter::WindowedCounter;
//! use seatflow_redis::RedisKeyValueStore;
//!
//! # async fn example() -> seatflow_core::Result<()> {
//! let store = RedisKeyValueStore::new("redis://127.0.0.1:6379").await?;
//! let counter = WindowedCounter::new(store, "reservation");
//!
//! let count = counter.incr(chrono::Utc::now(), 60).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use seatflow_core::config::RedisConfig;
use seatflow_core::error::{Result, SeatflowError};
use seatflow_core::store::{KeyValueStore, ttl_seconds};
use std::collections::HashMap;
use std::time::Duration;

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// `Redis`-backed key-value store.
///
/// Cloning is cheap; clones share the same [`ConnectionManager`], which
/// reconnects transparently after connection loss.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisKeyValueStore {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::StoreUnavailable`] if the URL is invalid or
    /// the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            SeatflowError::StoreUnavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            SeatflowError::StoreUnavailable(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        tracing::info!("Connected to Redis");

        Ok(Self { conn_manager })
    }

    /// Connect using [`RedisConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`RedisKeyValueStore::new`].
    pub async fn from_config(config: &RedisConfig) -> Result<Self> {
        Self::new(&config.url).await
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore").finish_non_exhaustive()
    }
}

fn unavailable(operation: &str, key: &str, e: &redis::RedisError) -> SeatflowError {
    tracing::error!(error = %e, key = %key, operation = operation, "Redis command failed");
    SeatflowError::StoreUnavailable(format!("Redis {operation} on {key} failed: {e}"))
}

/// Escape glob metacharacters so `prefix` matches literally in `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl KeyValueStore for RedisKeyValueStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut conn = self.conn_manager.clone();

        // Note: .ignore() drops the EXPIRE reply only; its errors still fail
        // the whole transaction.
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1_i64)
            .expire(key, ttl_seconds(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("INCR+EXPIRE", key, &e))?;

        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(key)
            .await
            .map_err(|e| unavailable("DEL", key, &e))?;

        Ok(())
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let (): () = redis::pipe()
            .atomic()
            .hset(key, field, value)
            .ignore()
            .expire(key, ttl_seconds(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("HSET+EXPIRE", key, &e))?;

        Ok(())
    }

    async fn hash_replace_with_expiry(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        // HSET with no fields is a syntax error; an empty table is just the DEL
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields)
                .ignore()
                .expire(key, ttl_seconds(ttl))
                .ignore();
        }

        let (): () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("DEL+HSET+EXPIRE", key, &e))?;

        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();

        conn.hget(key, field)
            .await
            .map_err(|e| unavailable("HGET", key, &e))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn_manager.clone();

        conn.hgetall(key)
            .await
            .map_err(|e| unavailable("HGETALL", key, &e))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let pattern = format!("{}*", escape_glob(prefix));

        // SCAN rather than KEYS so a large keyspace never blocks the server.
        // SCAN may repeat keys across batches.
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable("SCAN", &pattern, &e))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort_unstable();
        keys.dedup();

        tracing::debug!(pattern = %pattern, count = keys.len(), "Scanned keys");

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("suspended:"), "suspended:");
        assert_eq!(escape_glob("a*b?c[d]e\\"), "a\\*b\\?c\\[d\\]e\\\\");
    }

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_incr_with_expiry_sets_ttl() {
        let store = RedisKeyValueStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = format!("test:incr:{}", uuid::Uuid::new_v4());

        assert_eq!(store.incr_with_expiry(&key, Duration::from_secs(30)).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry(&key, Duration::from_secs(30)).await.unwrap(), 2);

        let mut conn = store.conn_manager.clone();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((1..=30).contains(&ttl), "TTL should be set, got {ttl}");

        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_hash_replace_drops_old_fields() {
        let store = RedisKeyValueStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = format!("test:replace:{}", uuid::Uuid::new_v4());

        store
            .hash_set_with_expiry(&key, "old", "1", Duration::from_secs(30))
            .await
            .unwrap();
        store
            .hash_replace_with_expiry(
                &key,
                &[("new".to_string(), "2".to_string())],
                Duration::from_secs(30),
            )
            .await
            .unwrap();

        let all = store.hash_get_all(&key).await.unwrap();
        assert_eq!(all, HashMap::from([("new".to_string(), "2".to_string())]));
        assert_eq!(store.hash_get(&key, "old").await.unwrap(), None);

        store.hash_replace_with_expiry(&key, &[], Duration::from_secs(30)).await.unwrap();
        assert!(store.hash_get_all(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_scan_prefix_is_literal() {
        let store = RedisKeyValueStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let run = uuid::Uuid::new_v4();
        let keys = [
            format!("test:scan:{run}:a"),
            format!("test:scan:{run}:b"),
            format!("test:scan:{run}*:c"),
        ];
        for key in &keys {
            store.incr_with_expiry(key, Duration::from_secs(30)).await.unwrap();
        }

        let found = store.scan_prefix(&format!("test:scan:{run}:")).await.unwrap();
        assert_eq!(found, vec![keys[0].clone(), keys[1].clone()]);

        let found = store.scan_prefix(&format!("test:scan:{run}*")).await.unwrap();
        assert_eq!(found, vec![keys[2].clone()]);

        for key in &keys {
            store.delete(key).await.unwrap();
        }
    }
}
