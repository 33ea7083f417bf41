//! # Error Types
//!
//! Domain-specific error types for emporos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  emporos-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Field / line level input failures              │
//! │                                                                         │
//! │  emporos-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  emporos-ledger errors                                                 │
//! │  └── LedgerError      - What callers see, with an ErrorKind            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, number, line)
//! 3. Errors are enum variants, never String
//! 4. A rejected line always says WHICH line

use thiserror::Error;

use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough stock on hand for a sale or order line.
    ///
    /// ## User Workflow
    /// ```text
    /// Order line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "SKU1", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: Quantity,
        requested: Quantity,
    },

    /// A status change that the state machine does not allow.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// The document exists and the move is known, but its current
    /// state blocks the operation (invoiced order, same-day rule, ...).
    #[error("{entity} {reference}: {reason}")]
    Precondition {
        entity: &'static str,
        reference: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A rule violation tied to a 1-based document line.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Shorthand for a [`CoreError::Precondition`].
    pub fn precondition(
        entity: &'static str,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::Precondition {
            entity,
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Tags this error with a 1-based line number. Validation errors keep
    /// their own line wrapper so callers can still match on them.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            CoreError::Validation(err) => CoreError::Validation(err.at_line(line)),
            other => CoreError::Line {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The error with any line wrappers removed.
    pub fn innermost(&self) -> &CoreError {
        match self {
            CoreError::Line { source, .. } => source.innermost(),
            other => other,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any mutation happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A fractional quantity on a product sold in pieces.
    #[error("{field} must be a whole number for products sold in pieces (got {value})")]
    NotWholeQuantity { field: String, value: Quantity },

    /// Returned or received more than the source line allows.
    #[error("{field} {requested} exceeds the allowed {limit}")]
    ExceedsLimit {
        field: String,
        limit: Quantity,
        requested: Quantity,
    },

    /// Wraps a failure with the 1-based line number it came from.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Tags this error with a 1-based line number.
    pub fn at_line(self, line: usize) -> Self {
        ValidationError::Line {
            line,
            source: Box::new(self),
        }
    }

    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "SKU1".to_string(),
            available: Quantity::units(3),
            requested: Quantity::units(5),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SKU1: available 3, requested 5"
        );

        let err = CoreError::precondition("Invoice", "INV-2025-0001", "not issued today");
        assert_eq!(err.to_string(), "Invoice INV-2025-0001: not issued today");
    }

    #[test]
    fn test_stock_error_at_line() {
        let err = CoreError::InsufficientStock {
            code: "SKU1".to_string(),
            available: Quantity::units(3),
            requested: Quantity::units(5),
        }
        .at_line(2);
        assert_eq!(
            err.to_string(),
            "line 2: Insufficient stock for SKU1: available 3, requested 5"
        );
        assert!(matches!(err.innermost(), CoreError::InsufficientStock { .. }));

        let err = CoreError::from(ValidationError::required("quantity")).at_line(1);
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Line { line: 1, .. })
        ));
    }

    #[test]
    fn test_line_error_message() {
        let err = ValidationError::ExceedsLimit {
            field: "quantity".to_string(),
            limit: Quantity::units(5),
            requested: Quantity::units(6),
        }
        .at_line(2);
        assert_eq!(err.to_string(), "line 2: quantity 6 exceeds the allowed 5");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("code").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
