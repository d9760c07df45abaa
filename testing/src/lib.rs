//! # Seatflow Testing
//!
//! Testing utilities for the Seatflow numbering services.
//!
//! This crate provides:
//! - A tracing bootstrap for test output
//! - proptest strategies for sequence dates, ids and payment numbers
//! - [`Harness`]: every service wired to shared in-memory stores and one
//!   controllable clock, starting at a fixed or chosen instant
//!
//! ## Example
//!
//! ```
//! use seatflow_testing::Harness;
//!
//! # async fn example() -> seatflow_core::Result<()> {
//! let harness = Harness::new();
//! let counter = harness.counter();
//!
//! assert_eq!(counter.incr(harness.now(), 60).await?, 1);
//! harness.advance_secs(60);
//! assert_eq!(counter.incr(harness.now(), 60).await?, 1);
//! # Ok(())
//! # }
//! ```

pub mod harness;

/// Install a fmt subscriber writing through the test harness.
///
/// Honors `RUST_LOG`, defaulting to debug output from the Seatflow crates.
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "seatflow_core=debug,seatflow_redis=debug,seatflow_postgres=debug",
        )
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Property-based testing utilities using proptest.
pub mod strategies {
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use seatflow_core::codec::MAX_ENCODABLE;

    /// Valid sequence dates (`YYYYMMDD`) between 2000 and 2099.
    pub fn sequence_date() -> impl Strategy<Value = String> {
        (0_i64..36_500).prop_map(|offset| {
            let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
            (epoch + Duration::days(offset)).format("%Y%m%d").to_string()
        })
    }

    /// Strings that are not exactly eight ASCII digits.
    pub fn malformed_date() -> impl Strategy<Value = String> {
        prop_oneof![
            "[0-9]{0,7}",
            "[0-9]{9,12}",
            "[0-9]{4}-[0-9]{2}-[0-9]{2}",
            "[0-9]{7}[a-zA-Z /]",
        ]
    }

    /// Sequence targets, subject ids and member ids.
    pub fn identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,15}"
    }

    /// Numbers that fit in a payment code.
    pub fn encodable() -> impl Strategy<Value = u64> {
        0..=MAX_ENCODABLE
    }
}

// Re-export commonly used items
pub use harness::Harness;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use seatflow_core::sequence::SequenceDate;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }

    proptest! {
        #[test]
        fn prop_generated_dates_parse(date in strategies::sequence_date()) {
            prop_assert!(SequenceDate::parse(&date).is_ok());
        }

        #[test]
        fn prop_malformed_dates_rejected(date in strategies::malformed_date()) {
            prop_assert!(SequenceDate::parse(&date).is_err());
        }
    }
}
