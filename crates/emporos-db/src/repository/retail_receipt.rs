//! # Retail Receipt Repository
//!
//! Point-of-sale receipts. No balance posting, stock only.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{RetailReceipt, RetailReceiptItem};

const RETAIL_RECEIPT_COLUMNS: &str = r#"
    id, receipt_number, customer_id, issue_date, subtotal, vat_amount,
    total_amount, status, created_at
"#;

const RETAIL_RECEIPT_ITEM_COLUMNS: &str = r#"
    id, receipt_id, product_id, description, quantity, unit_price,
    discount_percentage, subtotal, vat_amount, final_price
"#;

/// Repository for retail receipt operations.
#[derive(Debug, Clone)]
pub struct RetailReceiptRepository {
    pool: SqlitePool,
}

impl RetailReceiptRepository {
    /// Creates a new RetailReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RetailReceiptRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RetailReceipt>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_items(&self, receipt_id: &str) -> DbResult<Vec<RetailReceiptItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, receipt_id).await
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<RetailReceipt>> {
        let sql = format!("SELECT {RETAIL_RECEIPT_COLUMNS} FROM retail_receipts WHERE id = ?1");
        let receipt = sqlx::query_as::<_, RetailReceipt>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(receipt)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<RetailReceipt> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("RetailReceipt", id))
    }

    pub async fn items(conn: &mut SqliteConnection, receipt_id: &str) -> DbResult<Vec<RetailReceiptItem>> {
        let sql = format!(
            "SELECT {RETAIL_RECEIPT_ITEM_COLUMNS} FROM retail_receipt_items WHERE receipt_id = ?1 ORDER BY rowid"
        );
        let items = sqlx::query_as::<_, RetailReceiptItem>(&sql)
            .bind(receipt_id)
            .fetch_all(conn)
            .await?;
        Ok(items)
    }

    pub async fn insert(conn: &mut SqliteConnection, receipt: &RetailReceipt) -> DbResult<()> {
        debug!(id = %receipt.id, number = %receipt.receipt_number, total = %receipt.total_amount, "Inserting retail receipt");

        let sql = format!(
            "INSERT INTO retail_receipts ({RETAIL_RECEIPT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        sqlx::query(&sql)
            .bind(&receipt.id)
            .bind(&receipt.receipt_number)
            .bind(&receipt.customer_id)
            .bind(receipt.issue_date)
            .bind(receipt.subtotal)
            .bind(receipt.vat_amount)
            .bind(receipt.total_amount)
            .bind(receipt.status)
            .bind(receipt.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &RetailReceiptItem) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO retail_receipt_items ({RETAIL_RECEIPT_ITEM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        );
        sqlx::query(&sql)
            .bind(&item.id)
            .bind(&item.receipt_id)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount_percentage)
            .bind(item.subtotal)
            .bind(item.vat_amount)
            .bind(item.final_price)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Deletes the receipt and its lines.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting retail receipt");

        let result = sqlx::query("DELETE FROM retail_receipts WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("RetailReceipt", id));
        }
        Ok(())
    }
}
