//! # Delivery Note Repository
//!
//! Delivery notes and their lines. Notes carry no prices and move no
//! stock; stock leaves with the order lines.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{bind_shipping, SHIPPING_COLUMNS};
use crate::error::{DbError, DbResult};
use emporos_core::{DeliveryNote, DeliveryNoteItem, DeliveryNoteStatus};

fn delivery_note_select() -> String {
    format!(
        "SELECT id, delivery_note_number, order_id, customer_id, issue_date, status, {SHIPPING_COLUMNS}, \
         notes, created_at FROM delivery_notes"
    )
}

/// Repository for delivery note operations.
#[derive(Debug, Clone)]
pub struct DeliveryNoteRepository {
    pool: SqlitePool,
}

impl DeliveryNoteRepository {
    /// Creates a new DeliveryNoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeliveryNoteRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DeliveryNote>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_items(&self, delivery_note_id: &str) -> DbResult<Vec<DeliveryNoteItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, delivery_note_id).await
    }

    /// All notes ever issued for an order, oldest first.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<DeliveryNote>> {
        let sql = format!("{} WHERE order_id = ?1 ORDER BY created_at, id", delivery_note_select());
        let notes = sqlx::query_as::<_, DeliveryNote>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(notes)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<DeliveryNote>> {
        let sql = format!("{} WHERE id = ?1", delivery_note_select());
        let note = sqlx::query_as::<_, DeliveryNote>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(note)
    }

    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<DeliveryNote> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("DeliveryNote", id))
    }

    /// The most recent preparing/shipped/delivered note for an order.
    pub async fn latest_active_for_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Option<DeliveryNote>> {
        let sql = format!(
            "{} WHERE order_id = ?1 AND status IN ('PREPARING', 'SHIPPED', 'DELIVERED') \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            delivery_note_select()
        );
        let note = sqlx::query_as::<_, DeliveryNote>(&sql)
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
        Ok(note)
    }

    pub async fn items(
        conn: &mut SqliteConnection,
        delivery_note_id: &str,
    ) -> DbResult<Vec<DeliveryNoteItem>> {
        let items = sqlx::query_as::<_, DeliveryNoteItem>(
            r#"
            SELECT id, delivery_note_id, product_id, description, quantity
            FROM delivery_note_items
            WHERE delivery_note_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(delivery_note_id)
        .fetch_all(conn)
        .await?;
        Ok(items)
    }

    pub async fn insert(conn: &mut SqliteConnection, note: &DeliveryNote) -> DbResult<()> {
        debug!(id = %note.id, number = %note.delivery_note_number, "Inserting delivery note");

        let query = sqlx::query(
            r#"
            INSERT INTO delivery_notes (
                id, delivery_note_number, order_id, customer_id, issue_date, status,
                shipping_name, shipping_address, shipping_city, shipping_postal_code,
                shipping_vat_number, purpose, carrier, license_plate,
                notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&note.id)
        .bind(&note.delivery_note_number)
        .bind(&note.order_id)
        .bind(&note.customer_id)
        .bind(note.issue_date)
        .bind(note.status);

        bind_shipping(query, &note.shipping)
            .bind(&note.notes)
            .bind(note.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &DeliveryNoteItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_note_items (id, delivery_note_id, product_id, description, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&item.id)
        .bind(&item.delivery_note_id)
        .bind(&item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: DeliveryNoteStatus,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating delivery note status");

        let result = sqlx::query("UPDATE delivery_notes SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("DeliveryNote", id));
        }
        Ok(())
    }
}
