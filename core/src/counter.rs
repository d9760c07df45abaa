//! Time-bucketed counters for rate limiting.
//!
//! # Algorithm
//!
//! Fixed windows aligned to the Unix epoch:
//! 1. `start = floor(unix(now) / w) * w`
//! 2. Key the counter as `{scope}.{start}`
//! 3. Increment and set the expiry to the window's end in one atomic unit
//!
//! Counts from different windows never interfere, and a finished window frees
//! its storage through the TTL without any cleanup pass.

use crate::error::{Result, SeatflowError};
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One fixed-length time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Unix timestamp (seconds) at which the window starts.
    pub start: i64,
    /// Window length in seconds.
    pub seconds: i64,
}

impl Window {
    /// The window of length `window_seconds` containing `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidArgument`] if `window_seconds` is zero
    /// or too large to be a Unix offset.
    pub fn containing(now: DateTime<Utc>, window_seconds: u64) -> Result<Self> {
        let seconds = i64::try_from(window_seconds)
            .ok()
            .filter(|&s| s > 0)
            .ok_or_else(|| {
                SeatflowError::InvalidArgument(format!(
                    "window length must be a positive number of seconds, got {window_seconds}"
                ))
            })?;

        let start = now.timestamp().div_euclid(seconds) * seconds;
        Ok(Self { start, seconds })
    }

    /// Unix timestamp at which the window ends (exclusive).
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.start + self.seconds
    }

    /// Store key of this window's counter.
    #[must_use]
    pub fn key(&self, scope: &str) -> String {
        format!("{scope}.{}", self.start)
    }

    /// Time from `now` until the window ends, between one second and the
    /// full window length.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = (self.end() - now.timestamp()).clamp(1, self.seconds);
        Duration::from_secs(left.unsigned_abs())
    }
}

/// Outcome of [`WindowedCounter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The operation fits within the window's limit.
    Admitted {
        /// Count after this operation.
        count: i64,
    },
    /// The window's limit is exhausted.
    Rejected {
        /// Count after this operation.
        count: i64,
        /// Time until the window rolls over.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` if the operation was admitted.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Windowed atomic counter scoped by a key prefix.
///
/// # Example
///
/// ```
/// use seatflow_core::counter::WindowedCounter;
/// use seatflow_core::mocks::InMemoryKeyValueStore;
/// use chrono::Utc;
///
/// # async fn example() -> seatflow_core::Result<()> {
/// let counter = WindowedCounter::new(InMemoryKeyValueStore::new(), "reservations");
/// let now = Utc::now();
///
/// assert_eq!(counter.incr(now, 60).await?, 1);
/// assert_eq!(counter.incr(now, 60).await?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WindowedCounter<S> {
    store: S,
    scope: String,
}

impl<S: KeyValueStore> WindowedCounter<S> {
    /// Create a counter over `store` whose keys start with `scope`.
    #[must_use]
    pub fn new(store: S, scope: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
        }
    }

    /// The key scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Increment the counter of the window containing `now`.
    ///
    /// The expiry is reapplied on every call so the entry disappears at the
    /// window's end regardless of further activity.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if `window_seconds` is zero
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn incr(&self, now: DateTime<Utc>, window_seconds: u64) -> Result<i64> {
        let window = Window::containing(now, window_seconds)?;
        let key = window.key(&self.scope);

        let count = self
            .store
            .incr_with_expiry(&key, window.remaining(now))
            .await?;

        tracing::debug!(key = %key, count = count, "Incremented window counter");

        Ok(count)
    }

    /// Delete the counter of the window containing `now`. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if `window_seconds` is zero
    /// - [`SeatflowError::StoreUnavailable`] if the store fails
    pub async fn reset(&self, now: DateTime<Utc>, window_seconds: u64) -> Result<()> {
        let window = Window::containing(now, window_seconds)?;
        let key = window.key(&self.scope);

        self.store.delete(&key).await?;

        tracing::info!(key = %key, "Reset window counter");

        Ok(())
    }

    /// Count this operation and check it against `limit`.
    ///
    /// The increment happens whether or not the operation is admitted, so a
    /// rejected caller keeps the window saturated until it rolls over.
    ///
    /// # Errors
    ///
    /// Same as [`WindowedCounter::incr`].
    pub async fn admit(
        &self,
        now: DateTime<Utc>,
        window_seconds: u64,
        limit: u64,
    ) -> Result<Admission> {
        let window = Window::containing(now, window_seconds)?;
        let count = self.incr(now, window_seconds).await?;

        if count.unsigned_abs() > limit {
            let retry_after = window.remaining(now);

            tracing::warn!(
                scope = %self.scope,
                count = count,
                limit = limit,
                retry_after_secs = retry_after.as_secs(),
                "Window limit exceeded"
            );
            metrics::counter!("seatflow.window.rejected", "scope" => self.scope.clone())
                .increment(1);

            return Ok(Admission::Rejected { count, retry_after });
        }

        Ok(Admission::Admitted { count })
    }
}
