//! # Invoice Repository
//!
//! Invoices, their lines, and the sums the balance reconciliation needs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders ──1:1──► invoices ◄──1:1── delivery_notes                      │
//! │                     │                                                   │
//! │                     ├── invoice_items (cascade)                         │
//! │                     ├── payment_invoices ──► payments                   │
//! │                     └── commissions (UNIQUE invoice_id)                 │
//! │                                                                         │
//! │  order_id and delivery_note_id are UNIQUE: a second invoice for the    │
//! │  same source fails at insert even if two requests race.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{bind_shipping, SHIPPING_COLUMNS};
use crate::error::{DbError, DbResult};
use emporos_core::{Invoice, InvoiceItem, InvoiceStatus, Money};

const INVOICE_ITEM_COLUMNS: &str = r#"
    id, invoice_id, product_id, description, quantity, unit_price, is_gift,
    discount_percentage, vat_percentage, vat_amount, total_price
"#;

fn invoice_select() -> String {
    format!(
        "SELECT id, invoice_number, order_id, delivery_note_id, customer_id, issue_date, due_date, \
         status, subtotal, discount_percentage, discount_amount, vat_amount, total_amount, \
         paid_amount, notes, {SHIPPING_COLUMNS}, created_at, updated_at FROM invoices"
    )
}

/// Repository for invoice operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("{} WHERE invoice_number = ?1", invoice_select());
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    pub async fn get_items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, invoice_id).await
    }

    /// A customer's invoices, oldest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "{} WHERE customer_id = ?1 ORDER BY issue_date, id",
            invoice_select()
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Issued invoices with a due date before `today`.
    pub async fn list_overdue(&self, today: chrono::NaiveDate) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "{} WHERE status = 'issued' AND due_date IS NOT NULL AND due_date < ?1 ORDER BY due_date, id",
            invoice_select()
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("{} WHERE id = ?1", invoice_select());
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(invoice)
    }

    /// Reads an invoice for a status or paid-amount change.
    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    pub async fn find_by_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("{} WHERE order_id = ?1", invoice_select());
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
        Ok(invoice)
    }

    pub async fn find_by_delivery_note(
        conn: &mut SqliteConnection,
        delivery_note_id: &str,
    ) -> DbResult<Option<Invoice>> {
        let sql = format!("{} WHERE delivery_note_id = ?1", invoice_select());
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(delivery_note_id)
            .fetch_optional(conn)
            .await?;
        Ok(invoice)
    }

    pub async fn items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let sql = format!(
            "SELECT {INVOICE_ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid"
        );
        let items = sqlx::query_as::<_, InvoiceItem>(&sql)
            .bind(invoice_id)
            .fetch_all(conn)
            .await?;
        Ok(items)
    }

    pub async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, number = %invoice.invoice_number, "Inserting invoice");

        let query = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, order_id, delivery_note_id, customer_id,
                issue_date, due_date, status, subtotal, discount_percentage,
                discount_amount, vat_amount, total_amount, paid_amount, notes,
                shipping_name, shipping_address, shipping_city, shipping_postal_code,
                shipping_vat_number, purpose, carrier, license_plate,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.order_id)
        .bind(&invoice.delivery_note_id)
        .bind(&invoice.customer_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.status)
        .bind(invoice.subtotal)
        .bind(invoice.discount_percentage)
        .bind(invoice.discount_amount)
        .bind(invoice.vat_amount)
        .bind(invoice.total_amount)
        .bind(invoice.paid_amount)
        .bind(&invoice.notes);

        bind_shipping(query, &invoice.shipping)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &InvoiceItem) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO invoice_items ({INVOICE_ITEM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        );
        sqlx::query(&sql)
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.is_gift)
            .bind(item.discount_percentage)
            .bind(item.vat_percentage)
            .bind(item.vat_amount)
            .bind(item.total_price)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating invoice status");

        let result = sqlx::query("UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    /// Writes the result of an allocation step.
    pub async fn set_paid_amount(
        conn: &mut SqliteConnection,
        id: &str,
        paid_amount: Money,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, paid_amount = %paid_amount, status = %status, "Updating invoice paid amount");

        let result = sqlx::query(
            "UPDATE invoices SET paid_amount = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(paid_amount)
        .bind(status)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }
        Ok(())
    }

    /// Σ total_amount of a customer's issued, paid and credited invoices.
    pub async fn posted_total_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM invoices
            WHERE customer_id = ?1 AND status IN ('issued', 'paid', 'credited')
            "#,
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
        Ok(total)
    }
}
