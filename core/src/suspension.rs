//! Self-expiring suspension flags for inventory keys.
//!
//! A suspension marks a subject (for example a sale date) as temporarily
//! unavailable, e.g. while a refund is in flight. Each subject is one hash:
//!
//! - **Key**: `{prefix}:{subject_id}`, where the prefix itself holds no `:`
//! - **Fields**: `member_id → subject_id`
//! - **TTL**: shared by the whole hash, refreshed by every [`SuspensionRegistry::save`]
//!
//! The TTL is the correctness backstop: a suspension whose clearing step was
//! skipped (crash, lost message) still lapses on its own.

use crate::error::{Result, SeatflowError};
use crate::store::KeyValueStore;
use std::collections::HashMap;
use std::time::Duration;

/// Registry of temporarily suspended subjects.
///
/// # Example
///
/// ```
/// use seatflow_core::mocks::InMemoryKeyValueStore;
/// use seatflow_core::suspension::SuspensionRegistry;
/// use std::time::Duration;
///
/// # async fn example() -> seatflow_core::Result<()> {
/// let registry = SuspensionRegistry::new(InMemoryKeyValueStore::new(), "suspended")?;
///
/// registry.save("20250101", "refund-17", Duration::from_secs(300)).await?;
/// assert_eq!(registry.find_keys().await?, vec!["20250101".to_string()]);
///
/// registry.delete_key("20250101").await?;
/// assert!(registry.find_keys().await?.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SuspensionRegistry<S> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> SuspensionRegistry<S> {
    /// Create a registry whose keys live under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidArgument`] if `prefix` is empty or
    /// contains `:`. A nested prefix such as `suspended:refund` would show up
    /// as subjects of the `suspended` registry.
    pub fn new(store: S, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { store, prefix })
    }

    /// The key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, subject_id: &str) -> String {
        format!("{}:{subject_id}", self.prefix)
    }

    /// Suspend `subject_id` on behalf of `member_id` for `ttl`.
    ///
    /// Upserts the member and resets the whole subject's expiry in one atomic
    /// operation, so continued activity keeps the subject suspended.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if either id is empty
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn save(&self, subject_id: &str, member_id: &str, ttl: Duration) -> Result<()> {
        validate_id("subject", subject_id)?;
        validate_id("member", member_id)?;

        let key = self.key(subject_id);
        self.store
            .hash_set_with_expiry(&key, member_id, subject_id, ttl)
            .await?;

        tracing::info!(
            subject_id = %subject_id,
            member_id = %member_id,
            ttl_seconds = ttl.as_secs(),
            "Suspension saved"
        );
        metrics::counter!("seatflow.suspension.saved", "prefix" => self.prefix.clone()).increment(1);

        Ok(())
    }

    /// Subject ids with a live suspension, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::StoreUnavailable`] if the store fails.
    pub async fn find_keys(&self) -> Result<Vec<String>> {
        let scan_prefix = format!("{}:", self.prefix);
        let keys = self.store.scan_prefix(&scan_prefix).await?;

        let mut subjects: Vec<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&scan_prefix))
            .filter(|subject| !subject.is_empty())
            .map(str::to_string)
            .collect();
        subjects.sort_unstable();
        subjects.dedup();

        tracing::debug!(prefix = %self.prefix, count = subjects.len(), "Listed suspensions");

        Ok(subjects)
    }

    /// Lift the suspension of `subject_id` immediately. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if `subject_id` is empty
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn delete_key(&self, subject_id: &str) -> Result<()> {
        validate_id("subject", subject_id)?;

        self.store.delete(&self.key(subject_id)).await?;

        tracing::info!(subject_id = %subject_id, "Suspension lifted");

        Ok(())
    }

    /// Whether `subject_id` currently has a live suspension.
    ///
    /// # Errors
    ///
    /// Same as [`SuspensionRegistry::delete_key`].
    pub async fn is_suspended(&self, subject_id: &str) -> Result<bool> {
        Ok(!self.members(subject_id).await?.is_empty())
    }

    /// Members holding the suspension of `subject_id`, mapped to their label.
    ///
    /// # Errors
    ///
    /// Same as [`SuspensionRegistry::delete_key`].
    pub async fn members(&self, subject_id: &str) -> Result<HashMap<String, String>> {
        validate_id("subject", subject_id)?;
        self.store.hash_get_all(&self.key(subject_id)).await
    }
}

/// Check that `prefix` can name a suspension registry.
///
/// # Errors
///
/// Returns [`SeatflowError::InvalidArgument`] if `prefix` is empty or
/// contains `:`.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SeatflowError::InvalidArgument(
            "suspension prefix must not be empty".into(),
        ));
    }
    if prefix.contains(':') {
        return Err(SeatflowError::InvalidArgument(format!(
            "suspension prefix {prefix:?} must not contain ':'"
        )));
    }
    Ok(())
}

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SeatflowError::InvalidArgument(format!(
            "{kind} id must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{InMemoryKeyValueStore, ManualClock, test_start};
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, SuspensionRegistry<InMemoryKeyValueStore>) {
        let clock = Arc::new(ManualClock::new(test_start()));
        let store = InMemoryKeyValueStore::with_clock(clock.clone());
        (clock, SuspensionRegistry::new(store, "suspended").unwrap())
    }

    #[tokio::test]
    async fn test_save_then_find() {
        let (_clock, registry) = setup();

        registry.save("D1", "M1", Duration::from_secs(5)).await.unwrap();

        assert_eq!(registry.find_keys().await.unwrap(), vec!["D1".to_string()]);
        assert!(registry.is_suspended("D1").await.unwrap());
    }

    #[tokio::test]
    async fn test_suspension_lapses_after_ttl() {
        let (clock, registry) = setup();

        registry.save("D1", "M1", Duration::from_secs(5)).await.unwrap();
        clock.advance(chrono::Duration::seconds(5));

        assert!(registry.find_keys().await.unwrap().is_empty());
        assert!(!registry.is_suspended("D1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_refreshes_ttl_for_whole_subject() {
        let (clock, registry) = setup();

        registry.save("D1", "M1", Duration::from_secs(5)).await.unwrap();
        clock.advance(chrono::Duration::seconds(4));
        registry.save("D1", "M2", Duration::from_secs(5)).await.unwrap();
        clock.advance(chrono::Duration::seconds(4));

        // 8 seconds after the first save, both members are still held
        let members = registry.members("D1").await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members.get("M1").map(String::as_str), Some("D1"));

        clock.advance(chrono::Duration::seconds(1));
        assert!(registry.find_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_key_is_immediate_and_idempotent() {
        let (_clock, registry) = setup();

        registry.save("D1", "M1", Duration::from_secs(600)).await.unwrap();
        registry.save("D2", "M1", Duration::from_secs(600)).await.unwrap();

        registry.delete_key("D1").await.unwrap();
        registry.delete_key("D1").await.unwrap();

        assert_eq!(registry.find_keys().await.unwrap(), vec!["D2".to_string()]);
    }

    #[tokio::test]
    async fn test_find_keys_ignores_other_prefixes() {
        let clock = Arc::new(ManualClock::new(test_start()));
        let store = InMemoryKeyValueStore::with_clock(clock);
        let sales = SuspensionRegistry::new(store.clone(), "suspended").unwrap();
        let refunds = SuspensionRegistry::new(store, "suspended_refund").unwrap();

        sales.save("D1", "M1", Duration::from_secs(60)).await.unwrap();
        refunds.save("D9", "M1", Duration::from_secs(60)).await.unwrap();

        assert_eq!(sales.find_keys().await.unwrap(), vec!["D1".to_string()]);
        assert_eq!(refunds.find_keys().await.unwrap(), vec!["D9".to_string()]);
    }

    #[test]
    fn test_nested_or_empty_prefix_rejected() {
        let store = InMemoryKeyValueStore::new();

        for prefix in ["suspended:refund", "suspended:", ":", ""] {
            assert!(matches!(
                SuspensionRegistry::new(store.clone(), prefix),
                Err(SeatflowError::InvalidArgument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_find_keys_empty_registry() {
        let (_clock, registry) = setup();
        assert!(registry.find_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ids_rejected() {
        let (_clock, registry) = setup();

        assert!(matches!(
            registry.save("", "M1", Duration::from_secs(5)).await,
            Err(SeatflowError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.save("D1", "", Duration::from_secs(5)).await,
            Err(SeatflowError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.delete_key("").await,
            Err(SeatflowError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (_clock, registry) = setup();
        registry.store.set_available(false);

        assert!(matches!(
            registry.save("D1", "M1", Duration::from_secs(5)).await,
            Err(SeatflowError::StoreUnavailable(_))
        ));
        assert!(matches!(
            registry.find_keys().await,
            Err(SeatflowError::StoreUnavailable(_))
        ));
    }
}
