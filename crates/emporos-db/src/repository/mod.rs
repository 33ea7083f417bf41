//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Reads from callers                                                    │
//! │       │  db.invoices().get_by_id(id)                                   │
//! │       ▼                                                                 │
//! │  &self methods ── any pooled connection                                │
//! │                                                                         │
//! │  Writes from emporos-ledger                                            │
//! │       │  let mut tx = db.begin_write().await?;                         │
//! │       │  InvoiceRepository::lock_for_update(tx.conn(), id)             │
//! │       │  InvoiceRepository::set_paid_amount(tx.conn(), ...)            │
//! │       ▼                                                                 │
//! │  associated fns taking &mut SqliteConnection ── the WriteTx's          │
//! │  connection, so every statement lands in the same transaction          │
//! │                                                                         │
//! │  SQL stays in this module; no business rules do.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and stock deltas
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and balance deltas
//! - [`SalesRepRepository`](sales_rep::SalesRepRepository), [`SupplierRepository`](supplier::SupplierRepository)
//! - [`OrderRepository`](order::OrderRepository) - Orders and lines
//! - [`DeliveryNoteRepository`](delivery_note::DeliveryNoteRepository)
//! - [`InvoiceRepository`](invoice::InvoiceRepository)
//! - [`PaymentRepository`](payment::PaymentRepository) - Payments and invoice links
//! - [`CreditNoteRepository`](credit_note::CreditNoteRepository)
//! - [`PurchaseOrderRepository`](purchase_order::PurchaseOrderRepository)
//! - [`StockReceiptRepository`](stock_receipt::StockReceiptRepository)
//! - [`RetailReceiptRepository`](retail_receipt::RetailReceiptRepository)
//! - [`CommissionRepository`](commission::CommissionRepository)
//! - [`JournalRepository`](journal::JournalRepository) - Stock movements, balance postings
//! - [`ActivityLogRepository`](activity_log::ActivityLogRepository) - Audit trail
//! - [`CounterRepository`](counter::CounterRepository) - Document number counters

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use emporos_core::ShippingDetails;

pub mod activity_log;
pub mod commission;
pub mod counter;
pub mod credit_note;
pub mod customer;
pub mod delivery_note;
pub mod invoice;
pub mod journal;
pub mod order;
pub mod payment;
pub mod product;
pub mod purchase_order;
pub mod retail_receipt;
pub mod sales_rep;
pub mod stock_receipt;
pub mod supplier;

#[cfg(test)]
pub(crate) mod fixtures;

/// Shipping block shared by orders, delivery notes and invoices.
pub(crate) const SHIPPING_COLUMNS: &str = "shipping_name, shipping_address, shipping_city, \
     shipping_postal_code, shipping_vat_number, purpose, carrier, license_plate";

/// Binds the eight shipping columns, in [`SHIPPING_COLUMNS`] order.
pub(crate) fn bind_shipping<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    shipping: &'q ShippingDetails,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&shipping.shipping_name)
        .bind(&shipping.shipping_address)
        .bind(&shipping.shipping_city)
        .bind(&shipping.shipping_postal_code)
        .bind(&shipping.shipping_vat_number)
        .bind(shipping.purpose)
        .bind(&shipping.carrier)
        .bind(&shipping.license_plate)
}
