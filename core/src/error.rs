//! Error types for numbering and concurrency-control operations.

use thiserror::Error;

/// Result type alias for seatflow operations.
pub type Result<T> = std::result::Result<T, SeatflowError>;

/// Error taxonomy for the numbering subsystem.
///
/// Every failure is reported to the immediate caller; none of them is fatal
/// to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeatflowError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// Malformed date, target, subject or window input.
    ///
    /// Never retried: the upstream request should be rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A code string with the wrong length or non-digit characters.
    #[error("Invalid code format: {0}")]
    InvalidFormat(String),

    /// Requested cache entry does not exist (or has expired).
    #[error("Not found: {0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════
    // Capacity
    // ═══════════════════════════════════════════════════════════

    /// Sequence value does not fit into the payment code width.
    ///
    /// Signals exhaustion of the code space for a (target, date) series.
    #[error("Sequence value {value} exceeds {width}-digit code width")]
    OutOfRange {
        /// The value that could not be encoded
        value: u64,
        /// Number of body digits available
        width: usize,
    },

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Backing store failed or could not be reached.
    ///
    /// A failed increment must not be assumed to have been applied.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SeatflowError {
    /// Returns `true` if the caller may retry the operation with backoff.
    ///
    /// # Examples
    ///
    /// ```
    /// # use seatflow_core::SeatflowError;
    /// assert!(SeatflowError::StoreUnavailable("timeout".into()).is_retryable());
    /// assert!(!SeatflowError::InvalidArgument("date".into()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Returns `true` if this error is due to invalid caller input.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidFormat(_) | Self::NotFound(_)
        )
    }

    /// Returns `true` if operators must be alerted.
    ///
    /// # Examples
    ///
    /// ```
    /// # use seatflow_core::SeatflowError;
    /// let err = SeatflowError::OutOfRange { value: 10_000_000, width: 7 };
    /// assert!(err.requires_operator_attention());
    /// ```
    #[must_use]
    pub const fn requires_operator_attention(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

impl From<serde_json::Error> for SeatflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
