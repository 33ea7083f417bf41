//! # Document Lifecycles
//!
//! One module per document family. Each adds its operations to
//! [`Ledger`](crate::Ledger) as an `impl` block and keeps the in-transaction
//! steps as free functions, so cascades (invoice → delivery note → order)
//! run inside the caller's `WriteTx`.
//!
//! ```text
//! reference ─┐
//!            ▼
//! orders ──► delivery_notes ──► invoices ──► payments
//!   ▲              │               │
//!   └── cancel ◄───┴── cancel ◄────┘          credit_notes
//!
//! purchasing ──► stock_receipts          retail
//! ```

pub mod credit_notes;
pub mod delivery_notes;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod purchasing;
pub mod reference;
pub mod retail;
pub mod stock_receipts;

pub use credit_notes::{CreditNoteRequest, ReturnLine};
pub use delivery_notes::{NewDeliveryNote, NewDeliveryNoteLine};
pub use invoices::InvoiceOptions;
pub use orders::{NewOrder, NewOrderLine, OrderLineChange};
pub use payments::NewPayment;
pub use purchasing::{NewPurchaseOrder, NewPurchaseOrderLine, ReceiveLine};
pub use reference::{NewCustomer, NewProduct, NewSalesRep};
pub use retail::{NewRetailLine, NewRetailReceipt};
