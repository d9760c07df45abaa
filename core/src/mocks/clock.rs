//! Controllable clock for TTL tests.

use crate::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Clock that only moves when told to.
///
/// # Example
///
/// ```
/// use seatflow_core::environment::Clock;
/// use seatflow_core::mocks::{ManualClock, test_start};
///
/// let clock = ManualClock::new(test_start());
/// clock.advance(chrono::Duration::seconds(30));
/// assert_eq!((clock.now() - test_start()).num_seconds(), 30);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }

    /// Set the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Default start time for tests: 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}
