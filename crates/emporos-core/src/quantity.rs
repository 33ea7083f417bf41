//! # Quantity Module
//!
//! Stock quantities are decimal (kg, liters and meters are sold in
//! fractions) but stored as an integer count of hundredths, the same
//! precision the quantity columns have always carried.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "2.5 kg"  ──►  Quantity(250)                                          │
//! │  "5 pcs"   ──►  Quantity(500)   is_whole() == true                     │
//! │  "1.5 pcs" ──►  rejected by validation (NotWholeQuantity), not here    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Hundredths in one unit.
pub const QTY_SCALE: i64 = 100;

// =============================================================================
// Quantity
// =============================================================================

/// A signed stock quantity with two decimal places.
///
/// Signed because the same type carries stock deltas: a sale is a
/// negative movement, a receipt a positive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Quantity(hundredths)
    }

    /// Whole units: `Quantity::units(5)` is 5.00.
    #[inline]
    pub const fn units(units: i64) -> Self {
        Quantity(units * QTY_SCALE)
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
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

    /// True when there is no fractional part.
    #[inline]
    pub const fn is_whole(&self) -> bool {
        self.0 % QTY_SCALE == 0
    }
}

impl fmt::Display for Quantity {
    /// `5`, `2.50`, `-0.25`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        if abs % QTY_SCALE == 0 {
            write!(f, "{}{}", sign, abs / QTY_SCALE)
        } else {
            write!(f, "{}{}.{:02}", sign, abs / QTY_SCALE, abs % QTY_SCALE)
        }
    }
}

impl FromStr for Quantity {
    type Err = ValidationError;

    /// Parses `"3"`, `"2.5"`, `"-0.25"`. More than two decimals is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a decimal number"));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimal places"));
        }

        let whole: i64 = whole.parse().map_err(|_| invalid("number too large"))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => frac.parse().map_err(|_| invalid("bad fraction"))?,
        };
        let hundredths = whole
            .checked_mul(QTY_SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| invalid("number too large"))?;

        Ok(Quantity(if negative { -hundredths } else { hundredths }))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

// =============================================================================
// Unit of Measure
// =============================================================================

/// How a product is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    /// Pieces. Only whole quantities are accepted.
    Pcs,
    Kg,
    Meter,
    Liter,
    Box,
    Other,
}

impl UnitOfMeasure {
    /// Pieces are the only unit that cannot be split.
    #[inline]
    pub const fn requires_whole(&self) -> bool {
        matches!(self, UnitOfMeasure::Pcs)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Pcs => "pcs",
            UnitOfMeasure::Kg => "kg",
            UnitOfMeasure::Meter => "meter",
            UnitOfMeasure::Liter => "liter",
            UnitOfMeasure::Box => "box",
            UnitOfMeasure::Other => "other",
        }
    }
}

impl Default for UnitOfMeasure {
    fn default() -> Self {
        UnitOfMeasure::Pcs
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("3".parse::<Quantity>().unwrap(), Quantity::units(3));
        assert_eq!("2.5".parse::<Quantity>().unwrap().hundredths(), 250);
        assert_eq!("0.25".parse::<Quantity>().unwrap().hundredths(), 25);
        assert_eq!("-1.75".parse::<Quantity>().unwrap().hundredths(), -175);

        assert!("".parse::<Quantity>().is_err());
        assert!("1.234".parse::<Quantity>().is_err());
        assert!("abc".parse::<Quantity>().is_err());
        assert!(".5".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::units(5).to_string(), "5");
        assert_eq!(Quantity::from_hundredths(250).to_string(), "2.50");
        assert_eq!(Quantity::from_hundredths(-25).to_string(), "-0.25");
    }

    #[test]
    fn test_whole() {
        assert!(Quantity::units(4).is_whole());
        assert!(!Quantity::from_hundredths(150).is_whole());
        assert!(UnitOfMeasure::Pcs.requires_whole());
        assert!(!UnitOfMeasure::Kg.requires_whole());
    }

    #[test]
    fn test_arithmetic() {
        let a = Quantity::units(20);
        let b = Quantity::units(5);
        assert_eq!(a - b, Quantity::units(15));
        assert_eq!(-b, Quantity::units(-5));
        let total: Quantity = vec![a, b].into_iter().sum();
        assert_eq!(total, Quantity::units(25));
    }
}
