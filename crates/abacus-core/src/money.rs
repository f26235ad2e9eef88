//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The register computes tax as subtotal * 0.05 in JavaScript:            │
//! │    31.5 * 0.05 = 1.5750000000000002  ❌ WRONG!                          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    "31.50" → 3150 cents, stored and summed as i64                      │
//! │    Anything with more than two decimals is rejected, never rounded     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! `Money` serializes as a decimal string (`"31.50"`). It deserializes from
//! that string form or from a plain JSON number, as long as the number has at
//! most two fractional digits.
//!
//! ## Usage
//! ```rust
//! use abacus_core::money::Money;
//!
//! let price = Money::parse("10.99").unwrap();
//! assert_eq!(price.cents(), 1099);
//!
//! let line = price.checked_mul_quantity(3).unwrap();
//! assert_eq!(line.to_string(), "32.97");
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::types::TaxRate;

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 2;

const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (cents).
///
/// ## Where Money is Used
/// ```text
/// Product.price ──► CartLine.price (locked) ──► OrderLine.price
///                                   │
///                                   └──► Cart subtotal ──► tax ──► total
/// ```
///
/// The database column is a plain `INTEGER`; with the `sqlx` feature this
/// type encodes transparently as that integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    ///
    /// ```rust
    /// use abacus_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_PER_MAJOR + minor)
        }
    }

    /// Parses an exact decimal amount such as `"31.50"`, `"30"` or `"-2.5"`.
    ///
    /// ## Rules
    /// - optional leading `-`
    /// - at least one integer digit
    /// - at most [`SCALE`] fractional digits (extra precision is an error)
    ///
    /// ```rust
    /// use abacus_core::money::Money;
    ///
    /// assert_eq!(Money::parse("31.5").unwrap().cents(), 3150);
    /// assert!(Money::parse("1.575").is_err());
    /// assert!(Money::parse("abc").is_err());
    /// ```
    pub fn parse(input: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidAmount {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (major_part, minor_part) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_part.is_empty() {
            return Err(invalid("missing integer digits"));
        }
        if !major_part.bytes().all(|b| b.is_ascii_digit())
            || !minor_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("not a decimal number"));
        }
        if minor_part.len() > SCALE as usize {
            return Err(invalid("more than two fractional digits"));
        }

        let major: i64 = major_part.parse().map_err(|_| invalid("out of range"))?;
        let mut minor: i64 = if minor_part.is_empty() {
            0
        } else {
            minor_part.parse().map_err(|_| invalid("out of range"))?
        };
        if minor_part.len() == 1 {
            minor *= 10;
        }

        let cents = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("out of range"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity. `None` on overflow.
    ///
    /// ```rust
    /// use abacus_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.checked_mul_quantity(3), Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Calculates tax, rounding half up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * bps + 5000) / 10000`
    ///
    /// ```rust
    /// use abacus_core::money::Money;
    /// use abacus_core::types::TaxRate;
    ///
    /// // 31.50 at 5% = 1.575 → 1.58
    /// let tax = Money::from_cents(3150).calculate_tax(TaxRate::from_bps(500));
    /// assert_eq!(tax, Some(Money::from_cents(158)));
    /// ```
    ///
    /// `None` when the tax does not fit in an `i64` of cents.
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        i64::try_from(tax_cents).ok().map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, also used as the wire format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl FromStr for Money {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(MINOR_PER_MAJOR)
            .map(Money)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("amount out of range"))?;
        self.visit_i64(v)
    }

    // The shortest round-trip rendering of an f64 is exactly the literal the
    // client wrote, so parsing it keeps 31.5 exact and rejects 1.5750000000000002.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        Money::parse(&v.to_string()).map_err(E::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_parse_accepts_exact_decimals() {
        assert_eq!(Money::parse("30").unwrap().cents(), 3000);
        assert_eq!(Money::parse("30.5").unwrap().cents(), 3050);
        assert_eq!(Money::parse("30.05").unwrap().cents(), 3005);
        assert_eq!(Money::parse(" 0.99 ").unwrap().cents(), 99);
        assert_eq!(Money::parse("-5.50").unwrap().cents(), -550);
    }

    #[test]
    fn test_parse_rejects_extra_precision_and_garbage() {
        assert!(Money::parse("1.575").is_err());
        assert!(Money::parse("").is_err());
        assert!(Money::parse(".5").is_err());
        assert!(Money::parse("1.2.3").is_err());
        assert!(Money::parse("1e3").is_err());
        assert!(Money::parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.checked_mul_quantity(3), Some(Money::from_cents(3000)));
        assert_eq!(a.checked_add(b), Some(Money::from_cents(1500)));

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let rate = TaxRate::from_bps(500);
        assert_eq!(Money::from_cents(6000).calculate_tax(rate), Some(Money::from_cents(300)));
        assert_eq!(Money::from_cents(3150).calculate_tax(rate), Some(Money::from_cents(158)));
        assert_eq!(Money::from_cents(3130).calculate_tax(rate), Some(Money::from_cents(157)));
    }

    #[test]
    fn test_large_amounts_report_overflow() {
        // Parses fine, but no quantity or tax above 1x fits.
        let huge = Money::parse("90000000000000000").unwrap();

        assert_eq!(huge.checked_mul_quantity(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(huge.calculate_tax(TaxRate::from_bps(u32::MAX)), None);
        assert_eq!(huge.checked_mul_quantity(1), Some(huge));
    }

    #[test]
    fn test_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(3150)).unwrap();
        assert_eq!(json, "\"31.50\"");
    }

    #[test]
    fn test_deserializes_strings_and_numbers() {
        let from_str: Money = serde_json::from_str("\"31.50\"").unwrap();
        let from_float: Money = serde_json::from_str("31.5").unwrap();
        let from_int: Money = serde_json::from_str("30").unwrap();

        assert_eq!(from_str.cents(), 3150);
        assert_eq!(from_float.cents(), 3150);
        assert_eq!(from_int.cents(), 3000);
    }

    #[test]
    fn test_deserialize_rejects_float_drift() {
        let drifted: Result<Money, _> = serde_json::from_str("1.5750000000000002");
        assert!(drifted.is_err());
    }
}
