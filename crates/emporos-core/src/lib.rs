//! # emporos-core: Pure Domain Logic for the Emporos Ledger
//!
//! Everything the ledger decides without touching storage: money and
//! quantity arithmetic, document statuses and their transition tables,
//! document numbers, line and invoice totals, allocation planning and
//! input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporos Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (UI / API layer, PDF, exports)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ one call per lifecycle operation       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    emporos-ledger (Ledger)                      │   │
//! │  │   numbering • stock • balance • allocation • commission • audit │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ emporos-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  money  │ │ status  │ │ pricing │ │numbering│ │allocation│ │   │
//! │  │   │quantity │ │Lifecycle│ │ totals  │ │ INV-... │ │   FIFO   │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  emporos-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (cents), `Percent` (basis points), half-even rounding
//! - [`quantity`] - `Quantity` (hundredths), units of measure
//! - [`types`] - Products, customers, reps, suppliers, journals, audit log
//! - [`documents`] - Orders, delivery notes, invoices, payments, credit notes, ...
//! - [`status`] - Status vocabularies and transition tables
//! - [`numbering`] - Document number formatting and parsing
//! - [`pricing`] - Line and document totals
//! - [`allocation`] - Payment-to-invoice allocation plan
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use emporos_core::money::{Money, Percent};
//! use emporos_core::pricing::price_order_line;
//! use emporos_core::quantity::Quantity;
//!
//! let line = price_order_line(
//!     Quantity::units(5),
//!     Some(Money::from_cents(10_000)),
//!     Percent::zero(),
//!     Percent::whole(24),
//!     false,
//!     None,
//! );
//! assert_eq!(line.total.to_string(), "620.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod documents;
pub mod error;
pub mod money;
pub mod numbering;
pub mod pricing;
pub mod quantity;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use documents::*;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use numbering::DocumentKind;
pub use quantity::{Quantity, UnitOfMeasure};
pub use status::*;
pub use types::*;
