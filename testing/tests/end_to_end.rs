//! End-to-end behavior of the numbering services over shared in-memory stores.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use seatflow_core::codec::PaymentCodeCodec;
use seatflow_core::config::NumberingConfig;
use seatflow_core::counter::Admission;
use seatflow_core::error::SeatflowError;
use seatflow_testing::{Harness, init_tracing, strategies};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Offer {
    id: String,
    price_cents: u64,
}

#[tokio::test]
async fn test_order_checkout_flow() {
    init_tracing();
    let harness = Harness::new();
    let counter = harness.counter();
    let suspensions = harness.suspensions().unwrap();
    let payments = harness.payments();
    let codec = PaymentCodeCodec::new();

    // Reservation admitted while the sale date is not suspended
    assert!(!suspensions.is_suspended("20250101").await.unwrap());
    assert!(counter.admit(harness.now(), 60, 2).await.unwrap().is_admitted());

    let order_no = harness.issuer().next("order", "20250101").await.unwrap();
    let code = payments.issue("payment", "20250101").await.unwrap();

    assert_eq!(order_no, 1);
    assert_eq!(codec.verify(code.as_str()), Some(1));

    // A refund suspends the date until it completes or the TTL lapses
    suspensions
        .save("20250101", "refund-1", harness.config().suspension_ttl())
        .await
        .unwrap();
    assert_eq!(suspensions.find_keys().await.unwrap(), vec!["20250101".to_string()]);

    harness.advance_secs(300);
    assert!(suspensions.find_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_services_share_state_across_instances() {
    let harness = Harness::new();

    // Two "processes" holding their own issuer over the same store
    let a = harness.issuer();
    let b = harness.issuer();

    assert_eq!(a.next("order", "20250101").await.unwrap(), 1);
    assert_eq!(b.next("order", "20250101").await.unwrap(), 2);
    assert_eq!(harness.sequences().current("order", "20250101"), Some(2));
}

#[tokio::test]
async fn test_concurrent_issuers_never_duplicate() {
    let harness = Harness::new();

    let mut handles = Vec::new();
    for i in 0..64 {
        let payments = harness.payments();
        let issuer = harness.issuer();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                issuer.next("payment", "20250101").await.unwrap()
            } else {
                let code = payments.issue("payment", "20250101").await.unwrap();
                PaymentCodeCodec::new().verify(code.as_str()).unwrap()
            }
        }));
    }

    let mut issued: Vec<u64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    issued.sort_unstable();

    assert_eq!(issued, (1..=64).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_window_rolls_over() {
    let harness = Harness::new();
    let counter = harness.counter();

    for expected in 1..=5 {
        assert_eq!(counter.incr(harness.now(), 60).await.unwrap(), expected);
    }

    harness.advance_secs(60);
    assert_eq!(counter.incr(harness.now(), 60).await.unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_caller_waits_for_next_window() {
    let harness = Harness::new();
    let counter = harness.counter();

    harness.advance_secs(45);
    counter.admit(harness.now(), 60, 1).await.unwrap();

    match counter.admit(harness.now(), 60, 1).await.unwrap() {
        Admission::Rejected { count, retry_after } => {
            assert_eq!(count, 2);
            assert_eq!(retry_after, Duration::from_secs(15));
        }
        Admission::Admitted { .. } => panic!("second call should be rejected"),
    }

    harness.advance_secs(15);
    assert!(counter.admit(harness.now(), 60, 1).await.unwrap().is_admitted());
}

#[test]
fn test_nested_suspension_prefix_rejected() {
    let harness =
        Harness::with_config(NumberingConfig::default().with_suspension_prefix("suspended:refund"));

    assert!(matches!(
        harness.suspensions(),
        Err(SeatflowError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_harness_starting_mid_window() {
    let start = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 50).unwrap();
    let harness = Harness::starting_at(start, NumberingConfig::default());
    let counter = harness.counter();

    assert_eq!(harness.now(), start);
    counter.admit(harness.now(), 60, 1).await.unwrap();

    match counter.admit(harness.now(), 60, 1).await.unwrap() {
        Admission::Rejected { retry_after, .. } => {
            assert_eq!(retry_after, Duration::from_secs(10));
        }
        Admission::Admitted { .. } => panic!("second call should be rejected"),
    }

    harness.advance_secs(10);
    assert!(counter.admit(harness.now(), 60, 1).await.unwrap().is_admitted());
}

#[tokio::test]
async fn test_offer_refresh_cycle() {
    let harness = Harness::new();
    let cache = harness.offers::<Offer>();
    let ttl = harness.config().offer_ttl();

    let early = Offer {
        id: "early".to_string(),
        price_cents: 4_500,
    };
    cache
        .store(&HashMap::from([("E1".to_string(), vec![early.clone()])]), ttl)
        .await
        .unwrap();

    assert_eq!(cache.find_by_event_id("E1").await.unwrap(), vec![early]);
    assert!(matches!(
        cache.find_by_event_id("E2").await,
        Err(SeatflowError::NotFound(_))
    ));

    // Refresh job missed its slot: the table lapses instead of going stale
    harness.advance_secs(600);
    assert!(cache.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_outage_reaches_every_caller() {
    let harness = Harness::new();
    harness.set_available(false);

    assert!(matches!(
        harness.issuer().next("order", "20250101").await,
        Err(SeatflowError::StoreUnavailable(_))
    ));
    assert!(matches!(
        harness.counter().incr(harness.now(), 60).await,
        Err(SeatflowError::StoreUnavailable(_))
    ));
    assert!(matches!(
        harness.suspensions().unwrap().find_keys().await,
        Err(SeatflowError::StoreUnavailable(_))
    ));
    assert!(matches!(
        harness.offers::<Offer>().find_all().await,
        Err(SeatflowError::StoreUnavailable(_))
    ));

    // A failed issuance must not have consumed a number
    harness.set_available(true);
    assert_eq!(harness.issuer().next("order", "20250101").await.unwrap(), 1);
}

proptest! {
    #[test]
    fn prop_issue_then_verify(date in strategies::sequence_date(), target in strategies::identifier()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let harness = Harness::new();

        let code = runtime.block_on(harness.payments().issue(&target, &date)).unwrap();

        prop_assert_eq!(PaymentCodeCodec::new().verify(code.as_str()), Some(1));
    }

    #[test]
    fn prop_malformed_dates_never_touch_store(date in strategies::malformed_date()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let harness = Harness::new();

        let result = runtime.block_on(harness.issuer().next("order", &date));

        prop_assert!(matches!(result, Err(SeatflowError::InvalidArgument(_))));
        prop_assert!(harness.sequences().is_empty());
    }

    #[test]
    fn prop_encoded_numbers_decode(n in strategies::encodable()) {
        let codec = PaymentCodeCodec::new();
        let code = codec.encode(n).unwrap();
        prop_assert_eq!(codec.verify(code.as_str()), Some(n));
    }
}
