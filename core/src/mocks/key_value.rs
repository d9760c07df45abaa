//! In-memory key-value store with TTL.

use crate::environment::{Clock, SystemClock};
use crate::error::{Result, SeatflowError};
use crate::store::{KeyValueStore, ttl_seconds};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Value {
    Integer(i64),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory [`KeyValueStore`] for testing.
///
/// Every operation runs under one mutex, so the combined operations are
/// atomic just like their Redis `MULTI/EXEC` counterparts. Expired keys are
/// purged lazily whenever the store is touched; a key is gone once the clock
/// reaches its expiry instant.
///
/// Clones share the same data.
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
    available: Arc<AtomicBool>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store evaluating TTLs against the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store evaluating TTLs against `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// [`SeatflowError::StoreUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_entries().len()
    }

    /// Whether the store holds no live keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of `key`, if it exists and has an expiry.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.live_entries();
        let expires_at = entries.get(key)?.expires_at?;
        (expires_at - now).to_std().ok()
    }

    /// Lock the table after dropping expired entries.
    fn live_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        entries
    }

    /// Lock for an operation, failing while the store is switched off.
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SeatflowError::StoreUnavailable(format!(
                "in-memory store offline during {operation}"
            )));
        }
        Ok(self.live_entries())
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        self.clock.now() + chrono::Duration::seconds(ttl_seconds(ttl))
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryKeyValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryKeyValueStore")
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn wrong_type(key: &str) -> SeatflowError {
    SeatflowError::StoreUnavailable(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

impl KeyValueStore for InMemoryKeyValueStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64> {
        let expires_at = self.expiry(ttl);
        let mut entries = self.begin("incr_with_expiry")?;

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Integer(0),
            expires_at: None,
        });
        let Value::Integer(count) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        *count += 1;
        let count = *count;
        entry.expires_at = Some(expires_at);

        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.begin("delete")?.remove(key);
        Ok(())
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<()> {
        let expires_at = self.expiry(ttl);
        let mut entries = self.begin("hash_set_with_expiry")?;

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        let Value::Hash(hash) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        hash.insert(field.to_string(), value.to_string());
        entry.expires_at = Some(expires_at);

        Ok(())
    }

    async fn hash_replace_with_expiry(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        let expires_at = self.expiry(ttl);
        let mut entries = self.begin("hash_replace_with_expiry")?;

        entries.remove(key);
        if !fields.is_empty() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(fields.iter().cloned().collect()),
                    expires_at: Some(expires_at),
                },
            );
        }

        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let entries = self.begin("hash_get")?;

        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(Value::Integer(_)) => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let entries = self.begin("hash_get_all")?;

        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(Value::Integer(_)) => Err(wrong_type(key)),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.begin("scan_prefix")?;

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_unstable();

        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mocks::{ManualClock, test_start};

    fn setup() -> (Arc<ManualClock>, InMemoryKeyValueStore) {
        let clock = Arc::new(ManualClock::new(test_start()));
        (clock.clone(), InMemoryKeyValueStore::with_clock(clock))
    }

    #[tokio::test]
    async fn test_incr_sets_expiry() {
        let (clock, store) = setup();

        assert_eq!(store.incr_with_expiry("k", Duration::from_secs(10)).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry("k", Duration::from_secs(10)).await.unwrap(), 2);
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(10)));

        clock.advance(chrono::Duration::seconds(10));
        assert!(store.is_empty());
        assert_eq!(store.incr_with_expiry("k", Duration::from_secs(10)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_type_is_rejected() {
        let (_clock, store) = setup();

        store
            .hash_set_with_expiry("h", "f", "v", Duration::from_secs(10))
            .await
            .unwrap();

        assert!(store.incr_with_expiry("h", Duration::from_secs(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_prefix_is_literal_and_sorted() {
        let (_clock, store) = setup();

        for key in ["s:b", "s:a", "s*:c", "t:a"] {
            store.incr_with_expiry(key, Duration::from_secs(10)).await.unwrap();
        }

        assert_eq!(store.scan_prefix("s:").await.unwrap(), vec!["s:a", "s:b"]);
        assert_eq!(store.scan_prefix("s*").await.unwrap(), vec!["s*:c"]);
    }

    #[tokio::test]
    async fn test_accessors_survive_poisoned_lock() {
        let (_clock, store) = setup();
        store.incr_with_expiry("k", Duration::from_secs(10)).await.unwrap();

        let shared = store.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = shared.entries.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(crashed.is_err());
        assert!(store.entries.is_poisoned());

        assert_eq!(store.len(), 1);
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(10)));
        assert_eq!(store.incr_with_expiry("k", Duration::from_secs(10)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let (_clock, store) = setup();
        store.set_available(false);

        assert!(store.delete("k").await.is_err());
        assert!(store.hash_get("k", "f").await.is_err());
        assert!(store.hash_get_all("k").await.is_err());
        assert!(store.scan_prefix("").await.is_err());
    }
}
