//! # Commission Repository
//!
//! One commission per invoice. The UNIQUE index on `invoice_id` is the
//! guard: a second insert for the same invoice fails even when two
//! paid-transitions race, and the commission engine treats that failure
//! as "already created".

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::{Commission, CommissionStatus};

const COMMISSION_COLUMNS: &str = r#"
    id, sales_rep_id, invoice_id, calculated_amount, calculation_date, status, paid_date
"#;

/// Repository for commission operations.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    pub async fn get_by_invoice(&self, invoice_id: &str) -> DbResult<Option<Commission>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_invoice(&mut conn, invoice_id).await
    }

    /// A rep's commissions, optionally filtered by status.
    pub async fn list_for_rep(
        &self,
        sales_rep_id: &str,
        status: Option<CommissionStatus>,
    ) -> DbResult<Vec<Commission>> {
        let sql = format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions \
             WHERE sales_rep_id = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY calculation_date, id"
        );
        let commissions = sqlx::query_as::<_, Commission>(&sql)
            .bind(sales_rep_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(commissions)
    }

    /// Number of commission rows for an invoice (0 or 1).
    pub async fn count_for_invoice(&self, invoice_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commissions WHERE invoice_id = ?1")
            .bind(invoice_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Commission>> {
        let sql = format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = ?1");
        let commission = sqlx::query_as::<_, Commission>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(commission)
    }

    pub async fn find_by_invoice(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Option<Commission>> {
        let sql = format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE invoice_id = ?1");
        let commission = sqlx::query_as::<_, Commission>(&sql)
            .bind(invoice_id)
            .fetch_optional(conn)
            .await?;
        Ok(commission)
    }

    /// Inserts a commission.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` on `commissions.invoice_id` when the
    ///   invoice already has one
    pub async fn insert(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
        debug!(id = %commission.id, invoice_id = %commission.invoice_id, amount = %commission.calculated_amount, "Inserting commission");

        let sql = format!(
            "INSERT INTO commissions ({COMMISSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        );
        sqlx::query(&sql)
            .bind(&commission.id)
            .bind(&commission.sales_rep_id)
            .bind(&commission.invoice_id)
            .bind(commission.calculated_amount)
            .bind(commission.calculation_date)
            .bind(commission.status)
            .bind(commission.paid_date)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Moves an unpaid commission to paid. Returns `false` if it was not unpaid.
    pub async fn mark_paid(conn: &mut SqliteConnection, id: &str, paid_date: NaiveDate) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE commissions SET status = 'PAID', paid_date = ?2 WHERE id = ?1 AND status = 'UNPAID'",
        )
        .bind(id)
        .bind(paid_date)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
