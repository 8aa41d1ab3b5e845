// crates/tally-core/src/amount.rs
//
// Fixed-point monetary amount used for every balance, reward, and delta.
//
// An Amount is a signed count of micro-units (1 unit = 10^6 micros). Nothing in
// this module touches floating point during arithmetic: add/sub/mul/div are all
// checked and return an ArithmeticError instead of wrapping or saturating.
//
// Rounding: when a product or quotient has more than six fractional digits the
// result is rounded half toward zero. 0.0000005 rounds to 0, 0.0000015 rounds
// to 0.000001, and -0.0000015 rounds to -0.000001.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ArithmeticError, ParseAmountError, ParseAmountErrorKind};

/// Number of fractional decimal digits carried by every amount.
pub const DECIMALS: usize = 6;

/// Number of micros in one whole unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// A fixed-point decimal amount with six fractional digits.
///
/// Equality and ordering are exact comparisons of the underlying micro count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    micros: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount { micros: 0 };

    /// Returns a zero amount.
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Create an amount from a raw micro count.
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create an amount from a whole number of units.
    ///
    /// # Example
    /// ```
    /// use tally_core::amount::Amount;
    /// let ten = Amount::from_units(10).unwrap();
    /// assert_eq!(ten.micros(), 10_000_000);
    /// ```
    pub fn from_units(units: i64) -> Result<Self, ArithmeticError> {
        units
            .checked_mul(MICROS_PER_UNIT)
            .map(Self::from_micros)
            .ok_or(if units < 0 {
                ArithmeticError::Underflow
            } else {
                ArithmeticError::Overflow
            })
    }

    /// The raw micro count.
    pub fn micros(&self) -> i64 {
        self.micros
    }

    pub fn is_zero(&self) -> bool {
        self.micros == 0
    }

    pub fn is_negative(&self) -> bool {
        self.micros < 0
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        self.micros
            .checked_add(rhs.micros)
            .map(Self::from_micros)
            .ok_or(if rhs.micros < 0 {
                ArithmeticError::Underflow
            } else {
                ArithmeticError::Overflow
            })
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        self.micros
            .checked_sub(rhs.micros)
            .map(Self::from_micros)
            .ok_or(if rhs.micros < 0 {
                ArithmeticError::Overflow
            } else {
                ArithmeticError::Underflow
            })
    }

    /// Multiply two amounts, rounding the product half toward zero.
    pub fn checked_mul(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        let product = i128::from(self.micros) * i128::from(rhs.micros);
        narrow(div_round_half_toward_zero(
            product,
            i128::from(MICROS_PER_UNIT),
        ))
    }

    /// Divide by another amount, rounding the quotient half toward zero.
    ///
    /// # Errors
    /// Returns `ArithmeticError::DivisionByZero` if `rhs` is zero.
    pub fn checked_div(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        if rhs.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let scaled = i128::from(self.micros) * i128::from(MICROS_PER_UNIT);
        narrow(div_round_half_toward_zero(scaled, i128::from(rhs.micros)))
    }

    /// Sum an iterator of amounts, failing on the first overflow.
    pub fn checked_sum<I>(amounts: I) -> Result<Amount, ArithmeticError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

/// Integer division rounding half toward zero. `denominator` must be non-zero.
fn div_round_half_toward_zero(numerator: i128, denominator: i128) -> i128 {
    let negative = (numerator < 0) != (denominator < 0);
    let n = numerator.unsigned_abs();
    let d = denominator.unsigned_abs();
    let mut quotient = n / d;
    let remainder = n % d;
    // Only a remainder strictly above one half bumps the magnitude.
    if remainder > d - remainder {
        quotient += 1;
    }
    // quotient <= |i64::MIN| * 10^6, which always fits in i128.
    let magnitude = quotient as i128;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn narrow(value: i128) -> Result<Amount, ArithmeticError> {
    i64::try_from(value)
        .map(Amount::from_micros)
        .map_err(|_| {
            if value < 0 {
                ArithmeticError::Underflow
            } else {
                ArithmeticError::Overflow
            }
        })
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parse `[-|+]digits[.digits]` with at most six fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |kind| ParseAmountError::new(kind, s);

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if body.is_empty() {
            return Err(fail(ParseAmountErrorKind::Empty));
        }

        let (whole, frac) = match body.split_once('.') {
            Some((whole, frac)) => {
                if whole.is_empty() || frac.is_empty() || frac.contains('.') {
                    return Err(fail(ParseAmountErrorKind::InvalidFormat));
                }
                (whole, frac)
            }
            None => (body, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(fail(ParseAmountErrorKind::InvalidDigit));
        }
        if frac.len() > DECIMALS {
            return Err(fail(ParseAmountErrorKind::TooPrecise));
        }

        let whole_value: i64 = whole
            .parse()
            .map_err(|_| fail(ParseAmountErrorKind::OutOfRange))?;
        let mut frac_value: i64 = 0;
        for (i, digit) in frac.bytes().enumerate() {
            let place = 10_i64.pow((DECIMALS - 1 - i) as u32);
            frac_value += i64::from(digit - b'0') * place;
        }

        let micros = whole_value
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|m| m.checked_add(frac_value))
            .ok_or_else(|| fail(ParseAmountErrorKind::OutOfRange))?;

        Ok(Amount::from_micros(if negative { -micros } else { micros }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.micros < 0 { "-" } else { "" };
        let magnitude = self.micros.unsigned_abs();
        let per_unit = MICROS_PER_UNIT as u64;
        let whole = magnitude / per_unit;
        let frac = magnitude % per_unit;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac_str = format!("{:06}", frac);
            write!(f, "{}{}.{}", sign, whole, frac_str.trim_end_matches('0'))
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_units(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        let units = i64::try_from(v).map_err(|_| E::custom(ArithmeticError::Overflow))?;
        Amount::from_units(units).map_err(E::custom)
    }

    // f64 Display is the shortest round-trip form and never uses an exponent,
    // so the same float always yields the same decimal text.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// A numeric field exactly as it appeared on the wire, not yet parsed.
///
/// Event payloads carry this instead of `Amount` so that a malformed value
/// survives decoding and is reported by the policy rule that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalText(pub String);

impl DecimalText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the text into a fixed-point amount.
    pub fn parse(&self) -> Result<Amount, ParseAmountError> {
        self.0.trim().parse()
    }
}

impl From<Amount> for DecimalText {
    fn from(amount: Amount) -> Self {
        Self(amount.to_string())
    }
}

impl fmt::Display for DecimalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DecimalText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct DecimalTextVisitor;

impl<'de> Visitor<'de> for DecimalTextVisitor {
    type Value = DecimalText;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any JSON value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DecimalText, E> {
        Ok(DecimalText::new(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DecimalText, E> {
        Ok(DecimalText(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DecimalText, E> {
        Ok(DecimalText(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DecimalText, E> {
        Ok(DecimalText(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DecimalText, E> {
        Ok(DecimalText(v.to_string()))
    }

    // Structured values are kept as their JSON text; they fail to parse later.
    fn visit_seq<A: de::SeqAccess<'de>>(self, seq: A) -> Result<DecimalText, A::Error> {
        let value = serde_json::Value::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
        Ok(DecimalText(value.to_string()))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, map: A) -> Result<DecimalText, A::Error> {
        let value = serde_json::Value::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(DecimalText(value.to_string()))
    }
}

impl<'de> Deserialize<'de> for DecimalText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalTextVisitor)
    }
}
