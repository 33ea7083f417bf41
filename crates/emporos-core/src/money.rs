//! # Money Module
//!
//! Provides the `Money` and `Percent` types and the single rounding rule
//! used for every derived amount in the ledger.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A customer balance is the running sum of thousands of postings.        │
//! │  Any drift there breaks reconciliation.                                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + one rounding step                        │
//! │    qty × price × (1 − disc) × (1 + vat) is computed EXACTLY in i128     │
//! │    and rounded to cents ONCE, half to even.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporos_core::money::{Money, Percent};
//!
//! let price = Money::from_cents(10_000);     // 100.00
//! let vat = Percent::from_bps(2_400);        // 24%
//!
//! assert_eq!(price.percent_of(vat).cents(), 2_400);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Rounding
// =============================================================================

/// Divides `numerator / denominator` and rounds half to even.
///
/// ## Bankers Rounding
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────┐
/// │  0.5 → 0, 1.5 → 2, 2.5 → 2, 3.5 → 4, -2.5 → -2                      │
/// │  Ties go to the nearest EVEN integer, so over many postings the     │
/// │  rounding error does not drift in one direction.                    │
/// └─────────────────────────────────────────────────────────────────────┘
/// ```
///
/// `denominator` must be positive.
pub fn round_half_even(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    let twice = remainder * 2;

    if twice > denominator || (twice == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► OrderItem.unit_price ──► OrderItem.total_price       │
/// │                                                    │                    │
/// │                                                    ▼                    │
/// │                                           Order.total_amount            │
/// │                                                                         │
/// │  InvoiceItem ──► Invoice.total_amount ──► Customer.balance (+)          │
/// │  Payment.amount_paid ────────────────────► Customer.balance (−)         │
/// │  CreditNote.total_amount ────────────────► Customer.balance (−)         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use emporos_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Returns `self × percent`, rounded half to even.
    ///
    /// ## Example
    /// ```rust
    /// use emporos_core::money::{Money, Percent};
    ///
    /// // 10.00 × 8.25% = 0.825 → 0.82 (tie goes to even)
    /// let tax = Money::from_cents(1000).percent_of(Percent::from_bps(825));
    /// assert_eq!(tax.cents(), 82);
    /// ```
    pub fn percent_of(&self, percent: Percent) -> Money {
        Money::from_exact(self.0 as i128 * percent.bps() as i128, BPS_SCALE)
    }

    /// Rounds an exact `numerator / denominator` cent amount.
    ///
    /// Saturates at the i64 bounds; amounts that large are rejected by
    /// validation long before they reach arithmetic.
    pub fn from_exact(numerator: i128, denominator: i128) -> Money {
        let cents = round_half_even(numerator, denominator);
        Money(cents.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Displays as `-12.50` (no currency symbol; rendering belongs to the UI).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (1 bp = 0.01%).
///
/// Used for VAT, line discounts, invoice discounts and commission rates.
/// The persisted precision is two decimal places of a percent, which is
/// exactly one basis point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// 100%.
    pub const HUNDRED: Percent = Percent(10_000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Whole percent, e.g. `Percent::whole(24)` is 24%.
    #[inline]
    pub const fn whole(pct: u32) -> Self {
        Percent(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `10000 − bps`, the multiplier for "after discount".
    #[inline]
    pub(crate) fn complement_bps(&self) -> i128 {
        BPS_SCALE - self.0 as i128
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_even_ties() {
        assert_eq!(round_half_even(5, 10), 0);
        assert_eq!(round_half_even(15, 10), 2);
        assert_eq!(round_half_even(25, 10), 2);
        assert_eq!(round_half_even(35, 10), 4);
        assert_eq!(round_half_even(-25, 10), -2);
        assert_eq!(round_half_even(-35, 10), -4);
    }

    #[test]
    fn test_round_half_even_non_ties() {
        assert_eq!(round_half_even(14, 10), 1);
        assert_eq!(round_half_even(16, 10), 2);
        assert_eq!(round_half_even(-14, 10), -1);
        assert_eq!(round_half_even(-16, 10), -2);
        assert_eq!(round_half_even(100, 10), 10);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
        assert_eq!(a.min(b), b);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percent_of() {
        let amount = Money::from_cents(10_000);
        assert_eq!(amount.percent_of(Percent::whole(24)).cents(), 2_400);
        assert_eq!(amount.percent_of(Percent::zero()).cents(), 0);
        // 0.15 × 50% = 0.075 → 0.08
        assert_eq!(Money::from_cents(15).percent_of(Percent::whole(50)).cents(), 8);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_percent_display() {
        assert_eq!(Percent::whole(24).to_string(), "24.00%");
        assert_eq!(Percent::from_bps(825).to_string(), "8.25%");
    }
}
