//! # emporos-db: Database Layer for the Emporos Ledger
//!
//! SQLite storage through sqlx: the connection pool, embedded migrations,
//! the write transaction guard and one repository per table family.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporos Data Flow                                │
//! │                                                                         │
//! │  Ledger::cancel_order(order_id, actor)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   emporos-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ OrderRepo     │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ InvoiceRepo   │    │ 001_ledger_  │  │   │
//! │  │   │ WriteTx       │    │ JournalRepo   │    │  schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`tx`] - `WriteTx`, the transaction every ledger write runs in
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporos_db::{Database, DbConfig, ProductRepository};
//!
//! let db = Database::new(DbConfig::new("emporos.db")).await?;
//!
//! let low = db.products().list_low_stock().await?;
//!
//! let mut tx = db.begin_write().await?;
//! let product = ProductRepository::lock_for_update(tx.conn(), &id).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use tx::WriteTx;

// Repository re-exports for convenience
pub use repository::activity_log::{ActivityFilter, ActivityLogRepository};
pub use repository::commission::CommissionRepository;
pub use repository::counter::CounterRepository;
pub use repository::credit_note::CreditNoteRepository;
pub use repository::customer::CustomerRepository;
pub use repository::delivery_note::DeliveryNoteRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::journal::JournalRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase_order::PurchaseOrderRepository;
pub use repository::retail_receipt::RetailReceiptRepository;
pub use repository::sales_rep::SalesRepRepository;
pub use repository::stock_receipt::StockReceiptRepository;
pub use repository::supplier::SupplierRepository;
