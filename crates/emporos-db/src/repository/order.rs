//! # Order Repository
//!
//! Sales orders and their lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  pending ──► processing ──► completed                                  │
//! │     │             │             │                                       │
//! │     └─────────────┴─────────────┴──► cancelled                         │
//! │                                                                         │
//! │  Each line remembers `stock_applied`: the quantity currently taken     │
//! │  out of stock for it. Edits move stock by (new − stock_applied),       │
//! │  cancellation and deletion give back exactly stock_applied.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{bind_shipping, SHIPPING_COLUMNS};
use crate::error::{DbError, DbResult};
use emporos_core::{Money, Order, OrderItem, OrderStatus};

const ORDER_ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, description, quantity, is_gift,
    unit_price, discount_percentage, vat_percentage, total_price,
    stock_applied, comments
"#;

fn order_select() -> String {
    format!(
        "SELECT id, order_number, customer_id, order_date, delivery_date, status, {SHIPPING_COLUMNS}, \
         total_amount, comments, created_at, updated_at FROM orders"
    )
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("{} WHERE order_number = ?1", order_select());
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, order_id).await
    }

    /// Lists orders, newest number first, optionally filtered by status.
    pub async fn list(&self, status: Option<OrderStatus>, limit: u32, offset: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{} WHERE (?1 IS NULL OR status = ?1) ORDER BY order_number DESC LIMIT ?2 OFFSET ?3",
            order_select()
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("{} WHERE id = ?1", order_select());
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Lines in entry order.
    pub async fn items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(conn)
            .await?;
        Ok(items)
    }

    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, number = %order.order_number, "Inserting order");

        let query = sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, order_date, delivery_date, status,
                shipping_name, shipping_address, shipping_city, shipping_postal_code,
                shipping_vat_number, purpose, carrier, license_plate,
                total_amount, comments, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.order_date)
        .bind(order.delivery_date)
        .bind(order.status);

        bind_shipping(query, &order.shipping)
            .bind(order.total_amount)
            .bind(&order.comments)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        debug!(id = %item.id, order_id = %item.order_id, quantity = %item.quantity, "Inserting order line");

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, description, quantity, is_gift,
                unit_price, discount_percentage, vat_percentage, total_price,
                stock_applied, comments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.is_gift)
        .bind(item.unit_price)
        .bind(item.discount_percentage)
        .bind(item.vat_percentage)
        .bind(item.total_price)
        .bind(item.stock_applied)
        .bind(&item.comments)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes back a line's quantity, price and applied stock.
    pub async fn update_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        debug!(id = %item.id, quantity = %item.quantity, "Updating order line");

        let result = sqlx::query(
            r#"
            UPDATE order_items SET
                quantity = ?2,
                unit_price = ?3,
                discount_percentage = ?4,
                vat_percentage = ?5,
                total_price = ?6,
                stock_applied = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&item.id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.discount_percentage)
        .bind(item.vat_percentage)
        .bind(item.total_price)
        .bind(item.stock_applied)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderItem", &item.id));
        }
        Ok(())
    }

    pub async fn delete_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<()> {
        debug!(id = %item_id, "Deleting order line");

        let result = sqlx::query("DELETE FROM order_items WHERE id = ?1")
            .bind(item_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderItem", item_id));
        }
        Ok(())
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating order status");

        let result = sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    pub async fn set_total(
        conn: &mut SqliteConnection,
        id: &str,
        total: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET total_amount = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(total)
            .bind(now)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Deletes the order; its lines go with it.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting order");

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }
}
