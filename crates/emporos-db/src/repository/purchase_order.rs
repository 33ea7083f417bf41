//! # Purchase Order Repository
//!
//! Purchase orders to suppliers and the per-line received quantity.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PO-2025-00001   DRAFT → ORDERED → PARTIALLY_RECEIVED → COMPLETED      │
//! │                                                                         │
//! │  line  product  quantity  quantity_received                            │
//! │  ────  ───────  ────────  ─────────────────                            │
//! │   1    SKU1        10           4   ◄── two stock receipts (3 + 1)     │
//! │   2    SKU2         5           5                                      │
//! │                                                                         │
//! │  CHECK (quantity_received >= 0); the upper bound is checked by the     │
//! │  ledger before any row is written.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{Money, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Quantity};

const PURCHASE_ORDER_COLUMNS: &str = r#"
    id, po_number, supplier_id, order_date, expected_delivery_date,
    status, total_amount, notes, created_at
"#;

const PURCHASE_ORDER_ITEM_COLUMNS: &str = r#"
    id, purchase_order_id, product_id, quantity, quantity_received, cost_price, total_cost
"#;

/// Repository for purchase order operations.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    /// Creates a new PurchaseOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_items(&self, purchase_order_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, purchase_order_id).await
    }

    pub async fn list(&self, status: Option<PurchaseOrderStatus>) -> DbResult<Vec<PurchaseOrder>> {
        let sql = format!(
            "SELECT {PURCHASE_ORDER_COLUMNS} FROM purchase_orders \
             WHERE (?1 IS NULL OR status = ?1) ORDER BY po_number DESC"
        );
        let orders = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let sql = format!("SELECT {PURCHASE_ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1");
        let order = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<PurchaseOrder> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("PurchaseOrder", id))
    }

    pub async fn items(
        conn: &mut SqliteConnection,
        purchase_order_id: &str,
    ) -> DbResult<Vec<PurchaseOrderItem>> {
        let sql = format!(
            "SELECT {PURCHASE_ORDER_ITEM_COLUMNS} FROM purchase_order_items \
             WHERE purchase_order_id = ?1 ORDER BY rowid"
        );
        let items = sqlx::query_as::<_, PurchaseOrderItem>(&sql)
            .bind(purchase_order_id)
            .fetch_all(conn)
            .await?;
        Ok(items)
    }

    pub async fn find_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Option<PurchaseOrderItem>> {
        let sql = format!("SELECT {PURCHASE_ORDER_ITEM_COLUMNS} FROM purchase_order_items WHERE id = ?1");
        let item = sqlx::query_as::<_, PurchaseOrderItem>(&sql)
            .bind(item_id)
            .fetch_optional(conn)
            .await?;
        Ok(item)
    }

    pub async fn insert(conn: &mut SqliteConnection, order: &PurchaseOrder) -> DbResult<()> {
        debug!(id = %order.id, number = %order.po_number, "Inserting purchase order");

        let sql = format!(
            "INSERT INTO purchase_orders ({PURCHASE_ORDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        sqlx::query(&sql)
            .bind(&order.id)
            .bind(&order.po_number)
            .bind(&order.supplier_id)
            .bind(order.order_date)
            .bind(order.expected_delivery_date)
            .bind(order.status)
            .bind(order.total_amount)
            .bind(&order.notes)
            .bind(order.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &PurchaseOrderItem) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO purchase_order_items ({PURCHASE_ORDER_ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        );
        sqlx::query(&sql)
            .bind(&item.id)
            .bind(&item.purchase_order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.quantity_received)
            .bind(item.cost_price)
            .bind(item.total_cost)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Removes every line of a purchase order (line replacement).
    pub async fn delete_items(conn: &mut SqliteConnection, purchase_order_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = ?1")
            .bind(purchase_order_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Adds `delta` to a line's received quantity and returns the new value.
    pub async fn add_received(
        conn: &mut SqliteConnection,
        item_id: &str,
        delta: Quantity,
    ) -> DbResult<Quantity> {
        debug!(id = %item_id, delta = %delta, "Updating received quantity");

        let received: Option<Quantity> = sqlx::query_scalar(
            r#"
            UPDATE purchase_order_items
            SET quantity_received = quantity_received + ?2
            WHERE id = ?1
            RETURNING quantity_received
            "#,
        )
        .bind(item_id)
        .bind(delta)
        .fetch_optional(conn)
        .await?;

        received.ok_or_else(|| DbError::not_found("PurchaseOrderItem", item_id))
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: PurchaseOrderStatus,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating purchase order status");

        let result = sqlx::query("UPDATE purchase_orders SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PurchaseOrder", id));
        }
        Ok(())
    }

    pub async fn set_total(conn: &mut SqliteConnection, id: &str, total: Money) -> DbResult<()> {
        sqlx::query("UPDATE purchase_orders SET total_amount = ?2 WHERE id = ?1")
            .bind(id)
            .bind(total)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase order");

        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PurchaseOrder", id));
        }
        Ok(())
    }
}
