//! In-memory sequence store.

use crate::error::{Result, SeatflowError};
use crate::sequence::SequenceDate;
use crate::store::SequenceStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Counters = HashMap<(String, String), u64>;

/// In-memory [`SequenceStore`] for testing.
///
/// The read-increment-write of a counter happens under one lock, giving the
/// same per-key atomicity as the database upsert. Clones share the same data.
#[derive(Debug, Clone)]
pub struct InMemorySequenceStore {
    counters: Arc<Mutex<Counters>>,
    available: Arc<AtomicBool>,
}

impl InMemorySequenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the counter of `(target, date)` to `no`, as if `no` numbers had
    /// already been issued.
    pub fn seed(&self, target: &str, date: &str, no: u64) {
        self.counters()
            .insert((target.to_string(), date.to_string()), no);
    }

    /// Last number issued for `(target, date)`.
    #[must_use]
    pub fn current(&self, target: &str, date: &str) -> Option<u64> {
        self.counters()
            .get(&(target.to_string(), date.to_string()))
            .copied()
    }

    /// Number of series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters().len()
    }

    /// Whether no series exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate an outage.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for InMemorySequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStore for InMemorySequenceStore {
    async fn increment(&self, target: &str, date: &SequenceDate) -> Result<u64> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SeatflowError::StoreUnavailable(
                "in-memory sequence store offline".into(),
            ));
        }

        let mut counters = self.counters();
        let no = counters
            .entry((target.to_string(), date.as_str().to_string()))
            .or_insert(0);
        *no += 1;

        Ok(*no)
    }
}
