//! # emporos-ledger: Ledger and Document Lifecycle Engine
//!
//! Every operation that moves stock, money or a document status, each one
//! an all-or-nothing unit run inside a single write transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporos Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (UI / API layer, PDF, exports)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ledger.create_invoice_from_order(..)   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ emporos-ledger (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌───────────┐  ┌─────────┐  ┌──────────────┐   │   │
//! │  │   │ Ledger   │  │ lifecycle │  │ stock   │  │ allocation   │   │   │
//! │  │   │ (facade) │─►│ orders    │─►│ balance │  │ commission   │   │   │
//! │  │   │          │  │ invoices  │  │ audit   │  │ numbering    │   │   │
//! │  │   └──────────┘  └───────────┘  └─────────┘  └──────────────┘   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────────┐  ┌───▼─────────────────────────────────┐     │
//! │  │ emporos-core         │  │ emporos-db                          │     │
//! │  │ arithmetic, statuses │  │ WriteTx, repositories, migrations   │     │
//! │  └──────────────────────┘  └─────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ledger`] - The [`Ledger`] facade, stock corrections, reconciliation, audit queries
//! - [`lifecycle`] - Operations per document family
//! - [`numbering`] - Counter-backed document numbers with retry
//! - [`stock`] - Stock adjustments and the movement journal
//! - [`balance`] - Customer balance postings and reconciliation
//! - [`allocation`] - Payment-to-invoice allocation
//! - [`commission`] - Commission on paid invoices
//! - [`audit`] - Activity log entries
//! - [`config`] - Environment configuration
//! - [`error`] - Error types and the caller-facing report
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use emporos_ledger::{InvoiceOptions, Ledger, LedgerConfig};
//! use emporos_core::Actor;
//!
//! let ledger = Ledger::open(LedgerConfig::from_env()?).await?;
//! let actor = Actor::new(user.id, user.name);
//!
//! let order = ledger.create_order(new_order, &actor).await?;
//! let order = ledger.complete_order(&order.id, &actor).await?;
//! let invoice = ledger
//!     .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
//!     .await?;
//! ledger.mark_invoice_paid(&invoice.id, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod audit;
pub mod balance;
pub mod commission;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod numbering;
pub mod stock;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use balance::Reconciliation;
pub use config::{ConfigError, LedgerConfig};
pub use error::{ErrorKind, ErrorReport, LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use lifecycle::{
    CreditNoteRequest, InvoiceOptions, NewCustomer, NewDeliveryNote, NewDeliveryNoteLine,
    NewOrder, NewOrderLine, NewPayment, NewProduct, NewPurchaseOrder, NewPurchaseOrderLine,
    NewRetailLine, NewRetailReceipt, NewSalesRep, OrderLineChange, ReceiveLine, ReturnLine,
};
pub use stock::StockConservation;
