//! # Seatflow Core
//!
//! Numbering and concurrency-control primitives for a ticketing platform.
//!
//! Everything here is a thin, stateless service over shared storage: the
//! services hold no counters of their own, so any number of processes can
//! issue numbers or check limits at the same time.
//!
//! ## Components
//!
//! - **Sequences** ([`sequence`]): per-`(target, date)` counters that never
//!   hand out the same value twice
//! - **Payment codes** ([`codec`]): 7-digit numbers scrambled and wrapped in
//!   two check digits, so typos are caught before they reach a lookup
//! - **Windowed counters** ([`counter`]): fixed-window rate counting that
//!   expires on its own
//! - **Suspensions** ([`suspension`]): self-expiring "do not sell" flags
//! - **Offer cache** ([`offer_cache`]): a per-event lookup table replaced
//!   wholesale on every refresh
//!
//! Storage sits behind the traits in [`store`]; `seatflow-redis` and
//! `seatflow-postgres` provide the production backends, [`mocks`] the
//! in-memory ones.
//!
//! ## Example
//!
//! ```
//! use seatflow_core::mocks::InMemorySequenceStore;
//! use seatflow_core::sequence::PaymentNumberIssuer;
//!
//! # async fn example() -> seatflow_core::Result<()> {
//! let issuer = PaymentNumberIssuer::new(InMemorySequenceStore::new());
//!
//! let code = issuer.issue("payment", "20250101").await?;
//! assert_eq!(issuer.codec().verify(code.as_str()), Some(1));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod codec;
pub mod config;
pub mod counter;
pub mod error;
pub mod offer_cache;
pub mod sequence;
pub mod store;
pub mod suspension;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use codec::{Decoded, PaymentCode, PaymentCodeCodec};
pub use config::Config;
pub use counter::{Admission, Window, WindowedCounter};
pub use error::{Result, SeatflowError};
pub use offer_cache::OfferCache;
pub use sequence::{PaymentNumberIssuer, SequenceDate, SequenceIssuer};
pub use store::{KeyValueStore, SequenceStore};
pub use suspension::SuspensionRegistry;

/// Environment module - injected dependencies
///
/// All wall-clock reads go through [`Clock`](environment::Clock) so tests can
/// drive expiry deterministically.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use seatflow_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock reading the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
