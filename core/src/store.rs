//! Backing store interfaces.
//!
//! The numbering subsystem keeps no mutable state of its own. Every invariant
//! (unique sequence numbers, exact window counts, atomic TTL refresh) is
//! delegated to a single indivisible operation against one of these stores.
//!
//! ```text
//! SequenceIssuer ──────► SequenceStore   (document store: PostgreSQL)
//!
//! WindowedCounter ──┐
//! SuspensionRegistry├──► KeyValueStore   (key-value store with TTL: Redis)
//! OfferCache ───────┘
//! ```
//!
//! # Implementations
//!
//! - `PostgresSequenceStore` (in `seatflow-postgres`)
//! - `RedisKeyValueStore` (in `seatflow-redis`)
//! - `InMemorySequenceStore` / `InMemoryKeyValueStore` (in [`crate::mocks`])

use crate::error::Result;
use crate::sequence::SequenceDate;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Store holding one `{target, date, no}` record per (target, date) pair.
///
/// # Atomicity
///
/// `increment` must be a single indivisible "find, increment, create with
/// `no = 1` if absent, return the new value" operation. Implementing it as a
/// read followed by a write reintroduces duplicate numbers under concurrency.
pub trait SequenceStore: Send + Sync {
    /// Atomically increment the record for `(target, date)` and return the
    /// post-increment value (1 for a record that did not exist).
    ///
    /// # Errors
    ///
    /// Returns `SeatflowError::StoreUnavailable` if the store fails. In that
    /// case the increment must not be assumed to have been applied.
    fn increment(
        &self,
        target: &str,
        date: &SequenceDate,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Key-value store with TTL and atomic multi-step execution.
///
/// Operations ending in `_with_expiry` combine the mutation and the expiry
/// reset into one atomic unit.
///
/// # Errors
///
/// Every method returns `SeatflowError::StoreUnavailable` on store failure.
pub trait KeyValueStore: Send + Sync {
    /// Increment the integer at `key` (creating it at 0) and set its expiry
    /// to `ttl`, atomically. Returns the post-increment value.
    fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Delete `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Set one hash field and reset the expiry of the whole hash, atomically.
    fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replace the whole hash at `key` with `fields` and set its expiry,
    /// atomically. An empty `fields` slice leaves the key deleted.
    fn hash_replace_with_expiry(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read one hash field.
    fn hash_get(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Read every field of a hash. Missing or expired keys yield an empty map.
    fn hash_get_all(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    /// List live keys starting with the literal `prefix`.
    fn scan_prefix(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Whole seconds for a TTL, never less than one.
///
/// Stores reject or immediately expire keys given a zero TTL.
#[must_use]
pub fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX)
}
