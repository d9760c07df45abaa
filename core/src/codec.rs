//! Payment code encoding and validation.
//!
//! A payment code is the externally visible order/payment number. It is a
//! 9-digit string built from a sequence number:
//!
//! ```text
//! ┌────┬───────────────────────────────┬────┐
//! │ c2 │  7 body digits (permuted)     │ c1 │
//! └────┴───────────────────────────────┴────┘
//! ```
//!
//! 1. The number is zero-padded to [`CODE_WIDTH`] digits (the *source*).
//! 2. A weighted sum of the source digits, read right to left with weights
//!    [`WEIGHTS`], gives two checksums:
//!    `c1 = (11 - sum % 11) % 11` (with 10 folded to 0) and `c2 = 9 - sum % 9`.
//! 3. The body is the source reordered by permutation table `PERMUTATIONS[c1]`.
//!
//! Decoding inverts the permutation and recomputes both checksums. A mismatch
//! is a normal negative result (`valid == false`), not an error: user supplied
//! codes are routinely mistyped.
//!
//! The arithmetic is shared with downstream validators and must not change.
//!
//! # Example
//!
//! ```
//! use seatflow_core::codec::PaymentCodeCodec;
//!
//! # fn example() -> seatflow_core::Result<()> {
//! let codec = PaymentCodeCodec::new();
//! let code = codec.encode(1)?;
//! assert_eq!(code.as_str(), "700000109");
//!
//! let decoded = codec.decode(code.as_str())?;
//! assert!(decoded.valid);
//! assert_eq!(decoded.number, 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::error::{Result, SeatflowError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of body digits (zero-padded width of the sequence number).
pub const CODE_WIDTH: usize = 7;

/// Total code length: checksum2, body, checksum1.
pub const CODE_LENGTH: usize = CODE_WIDTH + 2;

/// Largest encodable sequence number.
pub const MAX_ENCODABLE: u64 = 9_999_999;

/// Checksum weights, indexed by digit position counted from the right.
pub const WEIGHTS: [u32; CODE_WIDTH] = [2, 6, 3, 7, 5, 4, 2];

/// Body permutations selected by checksum1.
///
/// `body[i] = source[PERMUTATIONS[c1][i]]`.
const PERMUTATIONS: [[usize; CODE_WIDTH]; 10] = [
    [6, 5, 0, 4, 1, 2, 3],
    [4, 0, 1, 5, 6, 3, 2],
    [2, 5, 3, 6, 1, 0, 4],
    [3, 5, 1, 6, 2, 4, 0],
    [5, 4, 1, 6, 3, 2, 0],
    [1, 3, 6, 2, 0, 4, 5],
    [0, 3, 2, 5, 4, 6, 1],
    [0, 1, 5, 4, 6, 2, 3],
    [5, 2, 6, 4, 3, 1, 0],
    [3, 0, 4, 1, 5, 6, 2],
];

type Source = [u8; CODE_WIDTH];
type Digits = [u8; CODE_LENGTH];

/// A well-formed payment code: exactly [`CODE_LENGTH`] ASCII digits.
///
/// Well-formed does not mean valid; use [`PaymentCodeCodec::decode`] to check
/// the checksums.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentCode(String);

impl PaymentCode {
    /// Parse a code string, checking only its shape.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidFormat`] unless `code` is exactly
    /// [`CODE_LENGTH`] ASCII digits.
    pub fn parse(code: &str) -> Result<Self> {
        parse_digits(code)?;
        Ok(Self(code.to_string()))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the code, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn from_digits(digits: &Digits) -> Self {
        Self(digits.iter().map(|d| char::from(b'0' + d)).collect())
    }
}

impl fmt::Display for PaymentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PaymentCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PaymentCode {
    type Error = SeatflowError;

    fn try_from(value: String) -> Result<Self> {
        parse_digits(&value)?;
        Ok(Self(value))
    }
}

impl From<PaymentCode> for String {
    fn from(code: PaymentCode) -> Self {
        code.0
    }
}

/// Result of decoding a well-formed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Number recovered from the body.
    ///
    /// Only meaningful when `valid` is `true`.
    pub number: u64,
    /// Whether both recomputed checksums match the code.
    pub valid: bool,
}

impl Decoded {
    /// The sequence number if the code is valid.
    #[must_use]
    pub const fn into_valid(self) -> Option<u64> {
        if self.valid { Some(self.number) } else { None }
    }
}

/// Stateless encoder/decoder for payment codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentCodeCodec;

impl PaymentCodeCodec {
    /// Create a codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a sequence number into a payment code.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::OutOfRange`] if `n` has more than
    /// [`CODE_WIDTH`] decimal digits.
    pub fn encode(&self, n: u64) -> Result<PaymentCode> {
        let source = to_source(n)?;
        Ok(PaymentCode::from_digits(&encode_source(&source)))
    }

    /// Decode and validate a payment code.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::InvalidFormat`] if `code` is not exactly
    /// [`CODE_LENGTH`] ASCII digits. Checksum mismatches are reported through
    /// [`Decoded::valid`], not as errors.
    pub fn decode(&self, code: &str) -> Result<Decoded> {
        let digits = parse_digits(code)?;
        let decoded = decode_digits(&digits);

        if !decoded.valid {
            tracing::debug!(code = %code, "Payment code failed checksum validation");
            metrics::counter!("seatflow.codec.rejected").increment(1);
        }

        Ok(decoded)
    }

    /// Convenience wrapper: the sequence number of a valid code, `None` for a
    /// malformed or invalid one.
    #[must_use]
    pub fn verify(&self, code: &str) -> Option<u64> {
        self.decode(code).ok().and_then(Decoded::into_valid)
    }
}

/// Compute `(checksum1, checksum2)` over the source digits.
// Both values are single digits by construction.
#[allow(clippy::cast_possible_truncation)]
fn checksums(source: &Source) -> (u8, u8) {
    let sum: u32 = source
        .iter()
        .rev()
        .zip(WEIGHTS)
        .map(|(&digit, weight)| u32::from(digit) * weight)
        .sum();

    let checksum1 = match (11 - sum % 11) % 11 {
        10 => 0,
        c => c,
    };
    let checksum2 = 9 - sum % 9;

    (checksum1 as u8, checksum2 as u8)
}

// Each slot holds `rest % 10`, always a single digit.
#[allow(clippy::cast_possible_truncation)]
fn to_source(n: u64) -> Result<Source> {
    if n > MAX_ENCODABLE {
        return Err(SeatflowError::OutOfRange {
            value: n,
            width: CODE_WIDTH,
        });
    }

    let mut source = [0u8; CODE_WIDTH];
    let mut rest = n;
    for slot in source.iter_mut().rev() {
        *slot = (rest % 10) as u8;
        rest /= 10;
    }
    Ok(source)
}

fn encode_source(source: &Source) -> Digits {
    let (checksum1, checksum2) = checksums(source);
    let table = &PERMUTATIONS[usize::from(checksum1)];

    let mut digits = [0u8; CODE_LENGTH];
    digits[0] = checksum2;
    for (i, &from) in table.iter().enumerate() {
        digits[1 + i] = source[from];
    }
    digits[CODE_LENGTH - 1] = checksum1;
    digits
}

fn decode_digits(digits: &Digits) -> Decoded {
    let checksum1 = digits[CODE_LENGTH - 1];
    let checksum2 = digits[0];
    let table = &PERMUTATIONS[usize::from(checksum1)];

    let mut source = [0u8; CODE_WIDTH];
    for (i, &to) in table.iter().enumerate() {
        source[to] = digits[1 + i];
    }

    let number = source
        .iter()
        .fold(0u64, |acc, &digit| acc * 10 + u64::from(digit));

    Decoded {
        number,
        valid: checksums(&source) == (checksum1, checksum2),
    }
}

fn parse_digits(code: &str) -> Result<Digits> {
    let bytes = code.as_bytes();
    if bytes.len() != CODE_LENGTH {
        return Err(SeatflowError::InvalidFormat(format!(
            "expected {CODE_LENGTH} digits, got {} characters",
            code.chars().count()
        )));
    }

    let mut digits = [0u8; CODE_LENGTH];
    for (slot, &byte) in digits.iter_mut().zip(bytes) {
        if !byte.is_ascii_digit() {
            return Err(SeatflowError::InvalidFormat(format!(
                "non-digit character in code {code:?}"
            )));
        }
        *slot = byte - b'0';
    }
    Ok(digits)
}
