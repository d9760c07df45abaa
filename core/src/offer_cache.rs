//! Refreshable cache of offers per event.
//!
//! One shared hash holds the whole table: field = event/subject id, value =
//! JSON-encoded list of offer descriptors. The descriptor type is opaque here;
//! any `Serialize + DeserializeOwned` type works.
//!
//! A periodic refresh job rebuilds the table and submits it in full through
//! [`OfferCache::store`]; pricing and availability logic read it back.

use crate::error::{Result, SeatflowError};
use crate::store::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

/// Per-event offer lookup table with a single shared expiry.
///
/// # Example
///
/// ```
/// use seatflow_core::mocks::InMemoryKeyValueStore;
/// use seatflow_core::offer_cache::OfferCache;
/// use std::collections::HashMap;
/// use std::time::Duration;
///
/// # async fn example() -> seatflow_core::Result<()> {
/// let cache: OfferCache<_, String> = OfferCache::new(InMemoryKeyValueStore::new(), "offers");
///
/// let table = HashMap::from([("E1".to_string(), vec!["early-bird".to_string()])]);
/// cache.store(&table, Duration::from_secs(600)).await?;
///
/// assert_eq!(cache.find_by_event_id("E1").await?, vec!["early-bird".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OfferCache<S, T> {
    store: S,
    table_key: String,
    _offer: PhantomData<fn() -> T>,
}

impl<S: Clone, T> Clone for OfferCache<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            table_key: self.table_key.clone(),
            _offer: PhantomData,
        }
    }
}

impl<S, T> OfferCache<S, T>
where
    S: KeyValueStore,
    T: Serialize + DeserializeOwned,
{
    /// Create a cache over the hash stored at `table_key`.
    #[must_use]
    pub fn new(store: S, table_key: impl Into<String>) -> Self {
        Self {
            store,
            table_key: table_key.into(),
            _offer: PhantomData,
        }
    }

    /// The key of the shared table.
    #[must_use]
    pub fn table_key(&self) -> &str {
        &self.table_key
    }

    /// Overwrite the whole table and reset its expiry, atomically.
    ///
    /// Entries missing from `table` are dropped; partial updates are not
    /// supported.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::SerializationError`] if an offer cannot be encoded
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn store(&self, table: &HashMap<String, Vec<T>>, ttl: Duration) -> Result<()> {
        let fields = table
            .iter()
            .map(|(event_id, offers)| Ok((event_id.clone(), serde_json::to_string(offers)?)))
            .collect::<Result<Vec<(String, String)>>>()?;

        self.store
            .hash_replace_with_expiry(&self.table_key, &fields, ttl)
            .await?;

        tracing::info!(
            table_key = %self.table_key,
            events = fields.len(),
            ttl_seconds = ttl.as_secs(),
            "Offer cache refreshed"
        );
        metrics::counter!("seatflow.offer_cache.refreshed").increment(1);

        Ok(())
    }

    /// Offers cached for `event_id`.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::NotFound`] if the event has no entry or the table
    ///   has expired
    /// - [`SeatflowError::SerializationError`] if the cached value is corrupt
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<T>> {
        let raw = self
            .store
            .hash_get(&self.table_key, event_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(event_id = %event_id, "Offer cache miss");
                SeatflowError::NotFound(format!("no cached offers for event {event_id}"))
            })?;

        Ok(serde_json::from_str(&raw)?)
    }

    /// The whole table; empty if it has expired or was never populated.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::SerializationError`] if a cached value is corrupt
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn find_all(&self) -> Result<HashMap<String, Vec<T>>> {
        self.store
            .hash_get_all(&self.table_key)
            .await?
            .into_iter()
            .map(|(event_id, raw)| Ok((event_id, serde_json::from_str(&raw)?)))
            .collect()
    }
}
