//! # Numbering Service
//!
//! Assigns `{PREFIX}-{YEAR}-{SEQUENCE}` numbers at first insert.
//!
//! ## Assignment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_numbered(order)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  counter row for (ORDER, 2025)?                                        │
//! │       ├── no  → seed = sequence of highest "ORDER-2025-%" number       │
//! │       │         (unparsable → count of matching numbers)               │
//! │       ▼                                                                 │
//! │  INSERT … ON CONFLICT DO UPDATE SET last_value = last_value + 1        │
//! │  RETURNING last_value                      → "ORDER-2025-0008"         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO orders (… order_number UNIQUE …)                          │
//! │       ├── ok              → done                                        │
//! │       └── UNIQUE failed   → next counter value, up to N attempts       │
//! │                             then NumberingExhausted                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter moves inside the caller's `WriteTx`, so a rolled back
//! operation gives its number back.

use std::future::Future;
use std::pin::Pin;

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use emporos_core::numbering::{format_customer_code, parse_customer_code, CUSTOMER_COUNTER_PREFIX};
use emporos_core::{
    CreditNote, DeliveryNote, DocumentKind, Invoice, Order, Payment, PurchaseOrder, RetailReceipt,
};
use emporos_db::{
    CounterRepository, CreditNoteRepository, CustomerRepository, DbResult, DeliveryNoteRepository,
    InvoiceRepository, OrderRepository, PaymentRepository, PurchaseOrderRepository,
    RetailReceiptRepository,
};

use crate::error::{LedgerError, LedgerResult};

/// Future returned by [`Numbered::insert`].
pub type InsertFuture<'a> = Pin<Box<dyn Future<Output = DbResult<()>> + Send + 'a>>;

/// A document that receives its number on first insert.
pub trait Numbered: Send + Sync {
    const KIND: DocumentKind;

    /// The year the sequence restarts on (the document's own date).
    fn document_year(&self) -> i32;

    fn set_number(&mut self, number: String);

    fn insert<'a>(&'a self, conn: &'a mut SqliteConnection) -> InsertFuture<'a>;
}

/// Next number of a kind and year. Moves the counter.
pub async fn next_number(conn: &mut SqliteConnection, kind: DocumentKind, year: i32) -> LedgerResult<String> {
    let prefix = kind.prefix();

    let seed = match CounterRepository::current(conn, prefix, year).await? {
        Some(_) => 0,
        None => seed_from_documents(conn, kind, year).await?,
    };

    let value = CounterRepository::increment(conn, prefix, year, seed).await?;
    let sequence = u32::try_from(value).map_err(|_| LedgerError::NumberingExhausted {
        prefix,
        year,
        attempts: 0,
    })?;

    Ok(kind.format(year, sequence))
}

/// Highest persisted sequence for a kind and year.
async fn seed_from_documents(conn: &mut SqliteConnection, kind: DocumentKind, year: i32) -> LedgerResult<i64> {
    let (table, column) = kind.storage();
    let like_prefix = kind.year_prefix(year);

    let Some(highest) = CounterRepository::highest_number(conn, table, column, &like_prefix).await? else {
        return Ok(0);
    };

    match kind.parse_sequence(year, &highest) {
        Some(sequence) => Ok(i64::from(sequence)),
        None => {
            let count = CounterRepository::count_numbers(conn, table, column, &like_prefix).await?;
            debug!(number = %highest, count, "Unparsable document number, seeding from count");
            Ok(count)
        }
    }
}

/// Numbers and inserts `doc`, retrying on a number collision.
///
/// ## Returns
/// * `Ok(number)` - the number the document was stored under
/// * `Err(LedgerError::NumberingExhausted)` - every attempt collided
pub async fn insert_numbered<D: Numbered>(
    conn: &mut SqliteConnection,
    doc: &mut D,
    attempts: u32,
) -> LedgerResult<String> {
    let year = doc.document_year();
    let (table, column) = D::KIND.storage();
    let unique_column = format!("{table}.{column}");
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        let number = next_number(conn, D::KIND, year).await?;
        doc.set_number(number.clone());

        match doc.insert(conn).await {
            Ok(()) => return Ok(number),
            Err(e) if e.is_unique_violation_on(&unique_column) => {
                warn!(number = %number, attempt, "Document number already taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(LedgerError::NumberingExhausted {
        prefix: D::KIND.prefix(),
        year,
        attempts,
    })
}

/// Next 4-digit customer code.
///
/// Seeded from the highest purely numeric code on first use.
pub async fn next_customer_code(conn: &mut SqliteConnection) -> LedgerResult<String> {
    let seed = match CounterRepository::current(conn, CUSTOMER_COUNTER_PREFIX, 0).await? {
        Some(_) => 0,
        None => CustomerRepository::all_codes(conn)
            .await?
            .iter()
            .filter_map(|code| parse_customer_code(code))
            .max()
            .map(i64::from)
            .unwrap_or(0),
    };

    let value = CounterRepository::increment(conn, CUSTOMER_COUNTER_PREFIX, 0, seed).await?;
    let sequence = u32::try_from(value).map_err(|_| LedgerError::NumberingExhausted {
        prefix: CUSTOMER_COUNTER_PREFIX,
        year: 0,
        attempts: 0,
    })?;

    Ok(format_customer_code(sequence))
}

// =============================================================================
// Numbered documents
// =============================================================================

macro_rules! numbered {
    ($ty:ty, $kind:expr, $field:ident, $date:ident, $repo:ident) => {
        impl Numbered for $ty {
            const KIND: DocumentKind = $kind;

            fn document_year(&self) -> i32 {
                chrono::Datelike::year(&self.$date)
            }

            fn set_number(&mut self, number: String) {
                self.$field = number;
            }

            fn insert<'a>(&'a self, conn: &'a mut SqliteConnection) -> InsertFuture<'a> {
                Box::pin($repo::insert(conn, self))
            }
        }
    };
}

numbered!(Order, DocumentKind::Order, order_number, order_date, OrderRepository);
numbered!(Invoice, DocumentKind::Invoice, invoice_number, issue_date, InvoiceRepository);
numbered!(Payment, DocumentKind::Payment, receipt_number, payment_date, PaymentRepository);
numbered!(CreditNote, DocumentKind::CreditNote, credit_note_number, issue_date, CreditNoteRepository);
numbered!(DeliveryNote, DocumentKind::DeliveryNote, delivery_note_number, issue_date, DeliveryNoteRepository);
numbered!(PurchaseOrder, DocumentKind::PurchaseOrder, po_number, order_date, PurchaseOrderRepository);
numbered!(RetailReceipt, DocumentKind::RetailReceipt, receipt_number, issue_date, RetailReceiptRepository);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use emporos_core::{new_id, Money, Supplier};
    use emporos_db::{Database, DbConfig, SupplierRepository};

    fn purchase_order(supplier_id: &str, day: NaiveDate) -> PurchaseOrder {
        PurchaseOrder {
            id: new_id(),
            po_number: String::new(),
            supplier_id: supplier_id.to_string(),
            order_date: day,
            expected_delivery_date: None,
            status: emporos_core::PurchaseOrderStatus::Draft,
            total_amount: Money::zero(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    async fn supplier(conn: &mut SqliteConnection) -> String {
        let supplier = Supplier {
            id: new_id(),
            name: "Acme".to_string(),
            vat_number: None,
            created_at: Utc::now(),
        };
        SupplierRepository::insert(conn, &supplier).await.unwrap();
        supplier.id
    }

    #[tokio::test]
    async fn test_numbers_increase_and_restart_per_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        let supplier_id = supplier(tx.conn()).await;

        let day_2025 = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let day_2026 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();

        let mut numbers = Vec::new();
        for day in [day_2025, day_2025, day_2026] {
            let mut po = purchase_order(&supplier_id, day);
            numbers.push(insert_numbered(tx.conn(), &mut po, 5).await.unwrap());
        }

        assert_eq!(numbers, vec!["PO-2025-00001", "PO-2025-00002", "PO-2026-00001"]);
    }

    #[tokio::test]
    async fn test_counter_seeded_from_existing_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        let supplier_id = supplier(tx.conn()).await;
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let mut imported = purchase_order(&supplier_id, day);
        imported.po_number = "PO-2025-00041".to_string();
        PurchaseOrderRepository::insert(tx.conn(), &imported).await.unwrap();

        let mut po = purchase_order(&supplier_id, day);
        let number = insert_numbered(tx.conn(), &mut po, 5).await.unwrap();
        assert_eq!(number, "PO-2025-00042");
    }

    #[tokio::test]
    async fn test_collision_retries_then_exhausts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        let supplier_id = supplier(tx.conn()).await;
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        // Counter says 0 but numbers 1 and 2 were written behind its back.
        CounterRepository::increment(tx.conn(), "PO", 2025, -1).await.unwrap();
        for n in 1..=2 {
            let mut taken = purchase_order(&supplier_id, day);
            taken.po_number = DocumentKind::PurchaseOrder.format(2025, n);
            PurchaseOrderRepository::insert(tx.conn(), &taken).await.unwrap();
        }

        let mut po = purchase_order(&supplier_id, day);
        assert_eq!(insert_numbered(tx.conn(), &mut po, 5).await.unwrap(), "PO-2025-00003");

        let mut blocked = purchase_order(&supplier_id, day);
        blocked.po_number = "PO-2025-00005".to_string();
        PurchaseOrderRepository::insert(tx.conn(), &blocked).await.unwrap();
        sqlx::query("UPDATE document_counters SET last_value = 4 WHERE prefix = 'PO' AND year = 2025")
            .execute(tx.conn())
            .await
            .unwrap();

        let mut po = purchase_order(&supplier_id, day);
        let err = insert_numbered(tx.conn(), &mut po, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::NumberingExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_customer_codes_follow_numeric_maximum() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();

        for code in ["0007", "RETAIL", "0003"] {
            let now = Utc::now();
            let customer = emporos_core::Customer {
                id: new_id(),
                code: code.to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                company_name: None,
                vat_number: None,
                address: None,
                city: None,
                postal_code: None,
                balance: Money::zero(),
                credit_limit: Money::zero(),
                parent_id: None,
                is_branch: false,
                can_be_invoiced: true,
                sales_rep_id: None,
                created_at: now,
                updated_at: now,
            };
            CustomerRepository::insert(tx.conn(), &customer).await.unwrap();
        }

        assert_eq!(next_customer_code(tx.conn()).await.unwrap(), "0008");
        assert_eq!(next_customer_code(tx.conn()).await.unwrap(), "0009");
    }
}
