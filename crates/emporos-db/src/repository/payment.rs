//! # Payment Repository
//!
//! Payments and the payment ⇄ invoice link table.
//!
//! ```text
//! ┌──────────────┐   payment_invoices    ┌──────────────┐
//! │   payments   │──────────────────────►│   invoices   │
//! │ amount_paid  │  (payment_id,          │ paid_amount  │
//! │ status       │   invoice_id) PK       │ status       │
//! └──────────────┘  applied_amount        └──────────────┘
//! ```
//!
//! `amount_paid` is never updated after insert; cancellation only flips
//! status and records who and why.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{Money, Payment};

const PAYMENT_COLUMNS: &str = r#"
    id, receipt_number, customer_id, payment_date, amount_paid, payment_method,
    reference_number, notes, status, cancellation_reason, cancelled_by,
    cancelled_at, recorded_by, created_at
"#;

/// Repository for payment operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = ?1 ORDER BY payment_date, id"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    /// Ids of the invoices linked to a payment, in link order.
    pub async fn get_linked_invoice_ids(&self, payment_id: &str) -> DbResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        Self::linked_invoice_ids(&mut conn, payment_id).await
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(payment)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Payment> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        debug!(id = %payment.id, number = %payment.receipt_number, amount = %payment.amount_paid, "Inserting payment");

        let sql = format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        );
        sqlx::query(&sql)
            .bind(&payment.id)
            .bind(&payment.receipt_number)
            .bind(&payment.customer_id)
            .bind(payment.payment_date)
            .bind(payment.amount_paid)
            .bind(payment.payment_method)
            .bind(&payment.reference_number)
            .bind(&payment.notes)
            .bind(payment.status)
            .bind(&payment.cancellation_reason)
            .bind(&payment.cancelled_by)
            .bind(payment.cancelled_at)
            .bind(&payment.recorded_by)
            .bind(payment.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Flips an active payment to cancelled.
    ///
    /// Returns `NotFound` when the payment is missing or already cancelled.
    pub async fn cancel(
        conn: &mut SqliteConnection,
        id: &str,
        reason: &str,
        cancelled_by: &str,
        cancelled_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, "Cancelling payment");

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'cancelled',
                cancellation_reason = ?2,
                cancelled_by = ?3,
                cancelled_at = ?4
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(cancelled_by)
        .bind(cancelled_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment (active)", id));
        }
        Ok(())
    }

    /// Links a payment to an invoice.
    ///
    /// Returns `false` when the link already existed, so callers only
    /// allocate over links that are new.
    pub async fn link_invoice(
        conn: &mut SqliteConnection,
        payment_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO payment_invoices (payment_id, invoice_id, applied_amount, linked_at)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(now)
        .execute(conn)
        .await?;

        let linked = result.rows_affected() == 1;
        debug!(payment_id = %payment_id, invoice_id = %invoice_id, linked, "Linking payment to invoice");
        Ok(linked)
    }

    /// Records what allocation moved from a payment to an invoice.
    pub async fn set_applied_amount(
        conn: &mut SqliteConnection,
        payment_id: &str,
        invoice_id: &str,
        applied: Money,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE payment_invoices SET applied_amount = ?3 WHERE payment_id = ?1 AND invoice_id = ?2",
        )
        .bind(payment_id)
        .bind(invoice_id)
        .bind(applied)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn linked_invoice_ids(conn: &mut SqliteConnection, payment_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT invoice_id FROM payment_invoices WHERE payment_id = ?1 ORDER BY linked_at, rowid",
        )
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// Σ amount_paid of a customer's active payments.
    pub async fn active_total_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_paid), 0) FROM payments WHERE customer_id = ?1 AND status = 'active'",
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
        Ok(total)
    }
}
