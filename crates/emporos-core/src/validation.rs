//! # Validation Module
//!
//! Input validation that runs before anything is written.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                           │
//! │  ├── Field format, ranges, whole-unit rule                             │
//! │  └── Per-line checks tagged with the line number                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger (inside the write transaction)                        │
//! │  ├── Stock availability against the locked product row                │
//! │  └── Returnable / receivable quantities                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE document numbers, one invoice per order                    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::quantity::{Quantity, UnitOfMeasure};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest product or customer code.
pub const MAX_CODE_LEN: usize = 100;

/// Longest display name.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a business code (product code, customer code).
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
/// - No whitespace inside
///
/// ## Example
/// ```rust
/// use emporos_core::validation::validate_code;
///
/// assert!(validate_code("code", "SKU-1").is_ok());
/// assert!(validate_code("code", "").is_err());
/// assert!(validate_code("code", "has space").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required(field));
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if code.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates a required display name (≤ 200 characters).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// A non-empty free-text reason (payment cancellation).
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::required("cancellation_reason"));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Prices may be zero (free items) but never negative.
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Percentages (VAT, discount, commission) must be within 0–100%.
pub fn validate_percent(field: &str, percent: Percent) -> ValidationResult<()> {
    if percent > Percent::HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// A payment must move money.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount_paid".to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity against the product's unit.
///
/// ## Rules
/// - Must be positive
/// - Products sold in pieces accept whole quantities only
///
/// ## Workflow
/// ```text
/// line qty 1.5, product unit = pcs
///      │
///      ▼
/// validate_line_quantity ← THIS FUNCTION
///      │
///      ├── qty <= 0?        → MustBePositive
///      ├── pcs & fraction?  → NotWholeQuantity
///      └── OK
/// ```
pub fn validate_line_quantity(
    quantity: Quantity,
    unit: Option<UnitOfMeasure>,
) -> ValidationResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if unit.map_or(false, |u| u.requires_whole()) && !quantity.is_whole() {
        return Err(ValidationError::NotWholeQuantity {
            field: "quantity".to_string(),
            value: quantity,
        });
    }

    Ok(())
}

/// Rejects a quantity above `limit` (returns, purchase receipts).
pub fn validate_within_limit(
    field: &str,
    requested: Quantity,
    limit: Quantity,
) -> ValidationResult<()> {
    if requested > limit {
        return Err(ValidationError::ExceedsLimit {
            field: field.to_string(),
            limit,
            requested,
        });
    }
    Ok(())
}

/// Checks that `requested` can be taken from `available`.
pub fn check_stock(code: &str, available: Quantity, requested: Quantity) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            code: code.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("code", "SKU1").is_ok());
        assert!(validate_code("code", "   ").is_err());
        assert!(validate_code("code", &"A".repeat(101)).is_err());
        assert!(validate_code("code", &"A".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Olive oil 1L").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("vat_percentage", Percent::whole(24)).is_ok());
        assert!(validate_percent("vat_percentage", Percent::whole(100)).is_ok());
        assert!(validate_percent("vat_percentage", Percent::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_line_quantity() {
        let pcs = Some(UnitOfMeasure::Pcs);
        let kg = Some(UnitOfMeasure::Kg);

        assert!(validate_line_quantity(Quantity::units(3), pcs).is_ok());
        assert!(validate_line_quantity(Quantity::from_hundredths(150), kg).is_ok());
        assert!(validate_line_quantity(Quantity::from_hundredths(150), None).is_ok());

        assert!(matches!(
            validate_line_quantity(Quantity::from_hundredths(150), pcs),
            Err(ValidationError::NotWholeQuantity { .. })
        ));
        assert!(matches!(
            validate_line_quantity(Quantity::zero(), kg),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_limits_and_stock() {
        assert!(validate_within_limit("quantity", Quantity::units(3), Quantity::units(5)).is_ok());
        assert!(validate_within_limit("quantity", Quantity::units(6), Quantity::units(5)).is_err());

        assert!(check_stock("SKU1", Quantity::units(20), Quantity::units(5)).is_ok());
        assert!(matches!(
            check_stock("SKU1", Quantity::units(2), Quantity::units(5)),
            Err(CoreError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_payment_amount_and_reason() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_reason("customer returned cheque").is_ok());
        assert!(validate_reason("  ").is_err());
    }
}
