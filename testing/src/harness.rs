//! In-memory service harness.

use chrono::{DateTime, Utc};
use seatflow_core::config::NumberingConfig;
use seatflow_core::counter::WindowedCounter;
use seatflow_core::Result;
use seatflow_core::environment::Clock;
use seatflow_core::mocks::{InMemoryKeyValueStore, InMemorySequenceStore, ManualClock, test_start};
use seatflow_core::offer_cache::OfferCache;
use seatflow_core::sequence::{PaymentNumberIssuer, SequenceIssuer};
use seatflow_core::suspension::SuspensionRegistry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Every Seatflow service over shared in-memory stores.
///
/// Services built from the same harness see the same data, like separate
/// processes sharing one Redis and one database. TTLs follow the harness
/// clock, which starts at [`test_start`] unless built with
/// [`Harness::starting_at`], and only moves on request.
#[derive(Debug, Clone)]
pub struct Harness {
    clock: Arc<ManualClock>,
    key_value: InMemoryKeyValueStore,
    sequences: InMemorySequenceStore,
    config: NumberingConfig,
}

impl Harness {
    /// Harness with the default numbering configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(NumberingConfig::default())
    }

    /// Harness using `config` for scopes, prefixes and keys.
    #[must_use]
    pub fn with_config(config: NumberingConfig) -> Self {
        Self::starting_at(test_start(), config)
    }

    /// Harness whose clock starts at `start`.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>, config: NumberingConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        Self {
            key_value: InMemoryKeyValueStore::with_clock(clock.clone()),
            sequences: InMemorySequenceStore::new(),
            clock,
            config,
        }
    }

    /// Current harness time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Move the harness clock forward.
    pub fn advance_secs(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    /// The numbering configuration.
    #[must_use]
    pub const fn config(&self) -> &NumberingConfig {
        &self.config
    }

    /// The shared key-value store.
    #[must_use]
    pub const fn key_value(&self) -> &InMemoryKeyValueStore {
        &self.key_value
    }

    /// The shared sequence store.
    #[must_use]
    pub const fn sequences(&self) -> &InMemorySequenceStore {
        &self.sequences
    }

    /// Take both stores offline, or bring them back.
    pub fn set_available(&self, available: bool) {
        self.key_value.set_available(available);
        self.sequences.set_available(available);
    }

    /// A sequence issuer.
    #[must_use]
    pub fn issuer(&self) -> SequenceIssuer<InMemorySequenceStore> {
        SequenceIssuer::new(self.sequences.clone())
    }

    /// A payment number issuer.
    #[must_use]
    pub fn payments(&self) -> PaymentNumberIssuer<InMemorySequenceStore> {
        PaymentNumberIssuer::new(self.sequences.clone())
    }

    /// A windowed counter on the configured scope.
    #[must_use]
    pub fn counter(&self) -> WindowedCounter<InMemoryKeyValueStore> {
        WindowedCounter::new(self.key_value.clone(), self.config.window_scope.clone())
    }

    /// A suspension registry under the configured prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidArgument`](seatflow_core::error::SeatflowError::InvalidArgument)
    /// if the configured prefix is empty or contains `:`.
    pub fn suspensions(&self) -> Result<SuspensionRegistry<InMemoryKeyValueStore>> {
        SuspensionRegistry::new(self.key_value.clone(), self.config.suspension_prefix.clone())
    }

    /// An offer cache on the configured table key.
    #[must_use]
    pub fn offers<T>(&self) -> OfferCache<InMemoryKeyValueStore, T>
    where
        T: Serialize + DeserializeOwned,
    {
        OfferCache::new(self.key_value.clone(), self.config.offer_table_key.clone())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
