//! # Money Module
//!
//! Integer-cents `Money`, the only representation of currency in the
//! engine.
//!
//! ## Why Integer Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  REFUNDS MUST BE EXACT AND REPEATABLE                                   │
//! │                                                                         │
//! │  A refund is recomputed from the sale line every time a return is       │
//! │  drafted. With floats, $20.00 × 5 / 10 can print as $9.999999...,       │
//! │  and two drafts of the same return can disagree by a cent.              │
//! │                                                                         │
//! │  With integer cents and explicit half-up rounding:                      │
//! │    2000 × 5 / 10 = 1000, every single time                              │
//! │                                                                         │
//! │  When a division is inexact we choose the rounding, we can name it      │
//! │  in an audit, and the database stores exactly what was refunded.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use apotheca_core::money::Money;
//!
//! let strip_price = Money::from_cents(2000); // $20.00 per strip
//! let two_strips = strip_price * 2;          // $40.00
//! let refund = strip_price.mul_div_round(5, 10); // 5 of 10 tablets: $10.00
//! assert_eq!(refund.cents(), 1000);
//! ```
//!
//! There is deliberately no constructor from `f64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in cents.
///
/// Signed so that adjustments and corrections can go below zero; a
/// finished refund amount is validated non-negative elsewhere. The struct
/// is a transparent wrapper over `i64`, so it is `Copy` and costs nothing
/// to pass around.
///
/// Every amount in the return pipeline is this type: the container price
/// on the medicine, the unit price on the sale line, the per-line refund
/// after cross-unit conversion, and the return totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Wraps a cent amount.
    ///
    /// ## Example
    /// ```rust
    /// use apotheca_core::money::Money;
    ///
    /// let copay = Money::from_cents(1250); // $12.50
    /// assert_eq!(copay.cents(), 1250);
    /// ```
    ///
    /// Cents are the unit everywhere: database columns, refund math, and
    /// serialized payloads. Formatting into dollars happens only at
    /// display time.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The raw cent amount.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole-dollar portion, truncated toward zero.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Cent remainder after the dollars, always in 0..=99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// The zero amount.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// True for exactly zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True for amounts above zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// True for amounts below zero.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Magnitude of the amount.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Scales the amount by a whole quantity.
    ///
    /// ## Example
    /// ```rust
    /// use apotheca_core::money::Money;
    ///
    /// let per_tablet = Money::from_cents(45);
    /// assert_eq!(per_tablet.multiply_quantity(12).cents(), 540);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `self × qty / divisor` with half-up rounding.
    ///
    /// This is the cross-unit refund conversion. A strip of 10 tablets
    /// sold at $20.00 refunds 5 loose tablets at strip_price × 5 / 10 =
    /// $10.00. When the division is inexact (say 7 tablets against a
    /// 3-pack price), the half-up rule picks the cent without touching
    /// floating point:
    ///
    /// ```text
    /// (cents × qty × 2 + divisor) / (2 × divisor)
    /// ```
    ///
    /// The added `divisor` is one half after the final division by
    /// `2 × divisor`, which is what rounds the halfway case up.
    /// Intermediate products run in i128 so a large price times a large
    /// quantity cannot overflow.
    ///
    /// ## Example
    /// ```rust
    /// use apotheca_core::money::Money;
    ///
    /// let strip = Money::from_cents(2000); // $20.00 per strip of 10
    /// assert_eq!(strip.mul_div_round(5, 10).cents(), 1000);
    ///
    /// // $10.50 / 4 = $2.625, rounds up to $2.63
    /// assert_eq!(Money::from_cents(1050).mul_div_round(1, 4).cents(), 263);
    /// ```
    ///
    /// ## Panics
    /// Debug-asserts that `divisor` is at least 1. Callers derive the
    /// divisor from `units_per_container`, which the data layer constrains
    /// to be >= 1.
    pub fn mul_div_round(&self, qty: i64, divisor: i64) -> Money {
        debug_assert!(divisor >= 1, "divisor must be >= 1");
        let scaled = self.0 as i128 * qty as i128 * 2 + divisor as i128;
        Money::from_cents((scaled / (2 * divisor as i128)) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly `$d.cc` rendering. Receipt formatting and localization
/// live in the host application, not here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

/// Quantity scaling via the `*` operator, i32 flavor for loop counters.
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_round_trip_and_parts() {
        let amount = Money::from_cents(1250);
        assert_eq!(amount.cents(), 1250);
        assert_eq!(amount.dollars(), 12);
        assert_eq!(amount.cents_part(), 50);

        let owed = Money::from_cents(-799);
        assert_eq!(owed.dollars(), -7);
        assert_eq!(owed.cents_part(), 99);
        assert_eq!(owed.abs().cents(), 799);
    }

    #[test]
    fn test_display_formats_sign_and_padding() {
        assert_eq!(Money::from_cents(1250).to_string(), "$12.50");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_operator_arithmetic() {
        let subtotal = Money::from_cents(2000) + Money::from_cents(450);
        assert_eq!(subtotal.cents(), 2450);

        let after_fee = subtotal - Money::from_cents(200);
        assert_eq!(after_fee.cents(), 2250);

        let mut running = Money::zero();
        running += Money::from_cents(300);
        running -= Money::from_cents(100);
        assert_eq!(running.cents(), 200);

        assert_eq!((Money::from_cents(45) * 12i64).cents(), 540);
        assert_eq!((Money::from_cents(45) * 12i32).cents(), 540);
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
        assert!(!Money::zero().is_negative());

        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::default().is_zero());
    }

    #[test]
    fn test_multiply_quantity() {
        let per_tablet = Money::from_cents(45);
        assert_eq!(per_tablet.multiply_quantity(12).cents(), 540);
        assert_eq!(per_tablet.multiply_quantity(0).cents(), 0);
    }

    #[test]
    fn test_mul_div_round_exact() {
        // 5 tablets of a $20.00 strip of 10 divides evenly
        let strip = Money::from_cents(2000);
        assert_eq!(strip.mul_div_round(5, 10).cents(), 1000);
    }

    #[test]
    fn test_mul_div_round_half_up() {
        // 262.5 cents lands exactly on the half and rounds up
        assert_eq!(Money::from_cents(1050).mul_div_round(1, 4).cents(), 263);

        // 262.25 cents is below the half and rounds down
        assert_eq!(Money::from_cents(1049).mul_div_round(1, 4).cents(), 262);
    }

    #[test]
    fn test_mul_div_round_large_values_no_overflow() {
        // cents × qty × 2 here would blow past i64; i128 intermediates hold it
        let price = Money::from_cents(5_000_000_000);
        let result = price.mul_div_round(1_000_000, 3);
        assert_eq!(result.cents(), 1_666_666_666_666_667);
    }

    /// Splitting a container price per unit and re-multiplying can land a
    /// cent short of the container price. That is accepted behavior; the
    /// cent goes unrefunded rather than invented.
    #[test]
    fn test_per_unit_rounding_documented() {
        let container = Money::from_cents(1000); // $10.00 for 3 units
        let one_unit = container.mul_div_round(1, 3);
        assert_eq!(one_unit.cents(), 333);

        let reconstructed: Money = one_unit * 3;
        assert_eq!(reconstructed.cents(), 999);
        assert_eq!((container - reconstructed).cents(), 1);
    }
}
