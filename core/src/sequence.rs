//! Dated sequence numbering.
//!
//! [`SequenceIssuer`] hands out the next integer of a `(target, date)` series.
//! [`PaymentNumberIssuer`] feeds those integers through the
//! [`PaymentCodeCodec`] to produce the externally visible payment number.
//!
//! # Example
//!
//! ```
//! use seatflow_core::mocks::InMemorySequenceStore;
//! use seatflow_core::sequence::SequenceIssuer;
//!
//! # async fn example() -> seatflow_core::Result<()> {
//! let issuer = SequenceIssuer::new(InMemorySequenceStore::new());
//!
//! assert_eq!(issuer.next("order", "20250101").await?, 1);
//! assert_eq!(issuer.next("order", "20250101").await?, 2);
//! assert_eq!(issuer.next("order", "20250102").await?, 1);
//! # Ok(())
//! # }
//! ```

use crate::codec::{CODE_WIDTH, PaymentCode, PaymentCodeCodec};
use crate::error::{Result, SeatflowError};
use crate::store::SequenceStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar day of a sequence series, exactly 8 ASCII digits (`YYYYMMDD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceDate(String);

impl SequenceDate {
    /// Parse a date string.
    ///
    /// Only the shape is checked (`\d{8}`); the series key is opaque.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidArgument`] if `date` is not exactly
    /// eight ASCII digits.
    pub fn parse(date: &str) -> Result<Self> {
        if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(date.to_string()))
        } else {
            Err(SeatflowError::InvalidArgument(format!(
                "sequence date must be 8 digits, got {date:?}"
            )))
        }
    }

    /// Date for a calendar day.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    /// The date string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SequenceDate {
    type Error = SeatflowError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SequenceDate> for String {
    fn from(date: SequenceDate) -> Self {
        date.0
    }
}

fn validate_target(target: &str) -> Result<()> {
    if target.is_empty() || target.chars().any(char::is_whitespace) {
        return Err(SeatflowError::InvalidArgument(format!(
            "sequence target must be a non-empty word, got {target:?}"
        )));
    }
    Ok(())
}

/// Issues the next number of a named, dated counter series.
///
/// For concurrent callers on the same `(target, date)` the returned values
/// form a gap-free permutation of `1..=K`, where K is the number of successful
/// calls. Uniqueness rests entirely on [`SequenceStore::increment`] being a
/// single atomic operation.
#[derive(Debug, Clone)]
pub struct SequenceIssuer<S> {
    store: S,
}

impl<S: SequenceStore> SequenceIssuer<S> {
    /// Create an issuer over a sequence store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Issue the next number for `(target, date)`.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if `date` is not 8 digits or
    ///   `target` is empty
    /// - [`SeatflowError::StoreUnavailable`] if the store fails; the caller
    ///   owns any retry policy
    pub async fn next(&self, target: &str, date: &str) -> Result<u64> {
        let date = SequenceDate::parse(date)?;
        self.next_for(target, &date).await
    }

    /// Issue the next number for the calendar day (UTC) containing `now`.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceIssuer::next`].
    pub async fn next_on(&self, target: &str, now: DateTime<Utc>) -> Result<u64> {
        let date = SequenceDate::from_date(now.date_naive());
        self.next_for(target, &date).await
    }

    async fn next_for(&self, target: &str, date: &SequenceDate) -> Result<u64> {
        validate_target(target)?;

        let no = self.store.increment(target, date).await.map_err(|e| {
            tracing::error!(
                series = %target,
                date = %date,
                error = %e,
                "Sequence increment failed"
            );
            e
        })?;

        tracing::debug!(series = %target, date = %date, no = no, "Issued sequence number");
        metrics::counter!("seatflow.sequence.issued", "target" => target.to_string()).increment(1);

        Ok(no)
    }
}

/// Issues payment codes: a sequence number run through the payment code codec.
#[derive(Debug, Clone)]
pub struct PaymentNumberIssuer<S> {
    sequences: SequenceIssuer<S>,
    codec: PaymentCodeCodec,
}

impl<S: SequenceStore> PaymentNumberIssuer<S> {
    /// Create a payment number issuer over a sequence store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            sequences: SequenceIssuer::new(store),
            codec: PaymentCodeCodec::new(),
        }
    }

    /// The codec used to validate issued codes.
    #[must_use]
    pub const fn codec(&self) -> &PaymentCodeCodec {
        &self.codec
    }

    /// Issue the next payment code for `(target, date)`.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] / [`SeatflowError::StoreUnavailable`]
    ///   as for [`SequenceIssuer::next`]
    /// - [`SeatflowError::OutOfRange`] once the series has outgrown the code
    ///   width; the consumed sequence number is skipped, never reused
    pub async fn issue(&self, target: &str, date: &str) -> Result<PaymentCode> {
        let no = self.sequences.next(target, date).await?;

        self.codec.encode(no).map_err(|e| {
            if e.requires_operator_attention() {
                tracing::error!(
                    series = %target,
                    date = %date,
                    no = no,
                    width = CODE_WIDTH,
                    "Payment code space exhausted"
                );
                metrics::counter!("seatflow.codec.exhausted", "target" => target.to_string())
                    .increment(1);
            }
            e
        })
    }
}
