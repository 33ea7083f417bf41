//! # Ledger Errors
//!
//! The one error type callers of the ledger see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ──► CoreError ──┐                                     │
//! │                                  ├──► LedgerError ──► kind()           │
//! │  sqlx::Error ──────► DbError ────┘         │                           │
//! │                                            ▼                           │
//! │                                   ErrorReport { kind, message }        │
//! │                                   {"kind":"CONFLICT","message":...}    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Kinds
//! | Kind         | Raised for                                          | Retried |
//! |--------------|-----------------------------------------------------|---------|
//! | `VALIDATION` | bad input, insufficient stock, over-return          | never   |
//! | `CONFLICT`   | operation not legal in the document's status        | never   |
//! | `NOT_FOUND`  | referenced entity missing                           | never   |
//! | `INTEGRITY`  | constraint collisions, numbering retries exhausted  | numbers |
//! | `INTERNAL`   | storage failures                                    | never   |

use serde::Serialize;
use thiserror::Error;

use emporos_core::{CoreError, ValidationError};
use emporos_db::DbError;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Every attempt to insert a fresh number collided.
    #[error("Could not assign a {prefix}-{year} number after {attempts} attempts")]
    NumberingExhausted {
        prefix: &'static str,
        year: i32,
        attempts: u32,
    },
}

/// Caller-facing classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Integrity,
    Internal,
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a conflict raised by document state.
    pub fn precondition(
        entity: &'static str,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::Core(CoreError::precondition(entity, reference, reason))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Core(err) => match err.innermost() {
                CoreError::Validation(_) | CoreError::InsufficientStock { .. } => {
                    ErrorKind::Validation
                }
                CoreError::InvalidTransition { .. } | CoreError::Precondition { .. } => {
                    ErrorKind::Conflict
                }
                CoreError::Line { .. } => ErrorKind::Validation,
            },
            LedgerError::Db(DbError::NotFound { .. }) | LedgerError::NotFound { .. } => {
                ErrorKind::NotFound
            }
            LedgerError::Db(DbError::UniqueViolation { .. })
            | LedgerError::Db(DbError::ForeignKeyViolation { .. })
            | LedgerError::NumberingExhausted { .. } => ErrorKind::Integrity,
            LedgerError::Db(_) => ErrorKind::Internal,
        }
    }

    /// Serializable form for the API layer.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

/// What a caller receives when an operation fails.
///
/// ```json
/// { "kind": "VALIDATION", "message": "Validation error: line 1: quantity 6 exceeds the allowed 5" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use emporos_core::Quantity;

    #[test]
    fn test_kinds() {
        let stock: LedgerError = CoreError::InsufficientStock {
            code: "SKU1".to_string(),
            available: Quantity::units(1),
            requested: Quantity::units(2),
        }
        .into();
        assert_eq!(stock.kind(), ErrorKind::Validation);

        let stock_at_line: LedgerError = CoreError::InsufficientStock {
            code: "SKU1".to_string(),
            available: Quantity::units(1),
            requested: Quantity::units(2),
        }
        .at_line(3)
        .into();
        assert_eq!(stock_at_line.kind(), ErrorKind::Validation);

        let state = LedgerError::precondition("Invoice", "INV-2025-0001", "not issued today");
        assert_eq!(state.kind(), ErrorKind::Conflict);

        let missing: LedgerError = DbError::not_found("Product", "p1").into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let exhausted = LedgerError::NumberingExhausted {
            prefix: "INV",
            year: 2025,
            attempts: 5,
        };
        assert_eq!(exhausted.kind(), ErrorKind::Integrity);
        assert_eq!(LedgerError::Db(DbError::Busy).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_report_serialization() {
        let err: LedgerError = ValidationError::required("customer").into();
        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["kind"], "VALIDATION");
        assert_eq!(json["message"], "Validation error: customer is required");
    }
}
