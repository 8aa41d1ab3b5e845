// crates/tally-core/src/error.rs
//
// Error types raised by the numeric core and the event model.

use std::fmt;

use thiserror::Error;

/// Failure of a checked arithmetic operation on an `Amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    /// Result is above the largest representable amount.
    #[error("Arithmetic overflow: result exceeds the maximum representable amount")]
    Overflow,

    /// Result is below the smallest representable amount.
    #[error("Arithmetic underflow: result is below the minimum representable amount")]
    Underflow,

    /// Divisor was zero.
    #[error("Division by zero")]
    DivisionByZero,
}

/// What was wrong with a decimal string that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAmountErrorKind {
    /// No digits at all.
    Empty,
    /// A dot without digits on both sides, or more than one dot.
    InvalidFormat,
    /// A character other than an ASCII digit.
    InvalidDigit,
    /// More fractional digits than the fixed scale can hold.
    TooPrecise,
    /// Magnitude does not fit in the amount representation.
    OutOfRange,
}

impl fmt::Display for ParseAmountErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountErrorKind::Empty => write!(f, "no digits"),
            ParseAmountErrorKind::InvalidFormat => write!(f, "malformed decimal point"),
            ParseAmountErrorKind::InvalidDigit => write!(f, "invalid digit"),
            ParseAmountErrorKind::TooPrecise => write!(f, "too many fractional digits"),
            ParseAmountErrorKind::OutOfRange => write!(f, "value out of range"),
        }
    }
}

/// A decimal string could not be parsed into an `Amount`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount {input:?}: {kind}")]
pub struct ParseAmountError {
    pub kind: ParseAmountErrorKind,
    pub input: String,
}

impl ParseAmountError {
    pub fn new(kind: ParseAmountErrorKind, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

/// Errors from encoding, hashing, or decoding ledger events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Canonical or wire serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A hex digest was not 32 bytes of valid hex.
    #[error("Invalid event hash: {0}")]
    InvalidHash(String),
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        EventError::Serialization(e.to_string())
    }
}
