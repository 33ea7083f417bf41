//! # Stock Receipt Repository
//!
//! Each row is one stock-increase event. Quick entries stand alone;
//! purchase-order receipts point at the PO line they fulfil.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{Quantity, StockReceipt};

const STOCK_RECEIPT_COLUMNS: &str = r#"
    id, product_id, quantity_added, date_received, purchase_order_item_id, notes, recorded_by
"#;

/// Repository for stock receipt operations.
#[derive(Debug, Clone)]
pub struct StockReceiptRepository {
    pool: SqlitePool,
}

impl StockReceiptRepository {
    /// Creates a new StockReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockReceiptRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockReceipt>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// A product's receipts, newest first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<StockReceipt>> {
        let sql = format!(
            "SELECT {STOCK_RECEIPT_COLUMNS} FROM stock_receipts WHERE product_id = ?1 \
             ORDER BY date_received DESC, id DESC"
        );
        let receipts = sqlx::query_as::<_, StockReceipt>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(receipts)
    }

    /// Receipts booked against one purchase-order line.
    pub async fn list_for_purchase_order_item(&self, item_id: &str) -> DbResult<Vec<StockReceipt>> {
        let sql = format!(
            "SELECT {STOCK_RECEIPT_COLUMNS} FROM stock_receipts WHERE purchase_order_item_id = ?1 \
             ORDER BY date_received, id"
        );
        let receipts = sqlx::query_as::<_, StockReceipt>(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(receipts)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<StockReceipt>> {
        let sql = format!("SELECT {STOCK_RECEIPT_COLUMNS} FROM stock_receipts WHERE id = ?1");
        let receipt = sqlx::query_as::<_, StockReceipt>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(receipt)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<StockReceipt> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("StockReceipt", id))
    }

    pub async fn insert(conn: &mut SqliteConnection, receipt: &StockReceipt) -> DbResult<()> {
        debug!(id = %receipt.id, product_id = %receipt.product_id, quantity = %receipt.quantity_added, "Inserting stock receipt");

        let sql = format!(
            "INSERT INTO stock_receipts ({STOCK_RECEIPT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        );
        sqlx::query(&sql)
            .bind(&receipt.id)
            .bind(&receipt.product_id)
            .bind(receipt.quantity_added)
            .bind(receipt.date_received)
            .bind(&receipt.purchase_order_item_id)
            .bind(&receipt.notes)
            .bind(&receipt.recorded_by)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_quantity(conn: &mut SqliteConnection, id: &str, quantity: Quantity) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Updating stock receipt");

        let result = sqlx::query("UPDATE stock_receipts SET quantity_added = ?2 WHERE id = ?1")
            .bind(id)
            .bind(quantity)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockReceipt", id));
        }
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting stock receipt");

        let result = sqlx::query("DELETE FROM stock_receipts WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockReceipt", id));
        }
        Ok(())
    }
}
