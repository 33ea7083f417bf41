//! # Credit Note Repository
//!
//! Credit notes issued against an invoice, with their returned lines.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::{CreditNote, CreditNoteItem, Money};

const CREDIT_NOTE_COLUMNS: &str = r#"
    id, credit_note_number, customer_id, original_invoice_id, issue_date,
    reason, status, subtotal, vat_amount, total_amount, created_at
"#;

const CREDIT_NOTE_ITEM_COLUMNS: &str = r#"
    id, credit_note_id, invoice_item_id, product_id, description, quantity,
    unit_price, vat_percentage, total_price, vat_amount
"#;

/// Repository for credit note operations.
#[derive(Debug, Clone)]
pub struct CreditNoteRepository {
    pool: SqlitePool,
}

impl CreditNoteRepository {
    /// Creates a new CreditNoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditNoteRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CreditNote>> {
        let sql = format!("SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes WHERE id = ?1");
        let note = sqlx::query_as::<_, CreditNote>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn get_items(&self, credit_note_id: &str) -> DbResult<Vec<CreditNoteItem>> {
        let sql = format!(
            "SELECT {CREDIT_NOTE_ITEM_COLUMNS} FROM credit_note_items WHERE credit_note_id = ?1 ORDER BY rowid"
        );
        let items = sqlx::query_as::<_, CreditNoteItem>(&sql)
            .bind(credit_note_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<CreditNote>> {
        let sql = format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes WHERE original_invoice_id = ?1 ORDER BY issue_date, id"
        );
        let notes = sqlx::query_as::<_, CreditNote>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(notes)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn insert(conn: &mut SqliteConnection, note: &CreditNote) -> DbResult<()> {
        debug!(id = %note.id, number = %note.credit_note_number, total = %note.total_amount, "Inserting credit note");

        let sql = format!(
            "INSERT INTO credit_notes ({CREDIT_NOTE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        );
        sqlx::query(&sql)
            .bind(&note.id)
            .bind(&note.credit_note_number)
            .bind(&note.customer_id)
            .bind(&note.original_invoice_id)
            .bind(note.issue_date)
            .bind(&note.reason)
            .bind(note.status)
            .bind(note.subtotal)
            .bind(note.vat_amount)
            .bind(note.total_amount)
            .bind(note.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &CreditNoteItem) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO credit_note_items ({CREDIT_NOTE_ITEM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        );
        sqlx::query(&sql)
            .bind(&item.id)
            .bind(&item.credit_note_id)
            .bind(&item.invoice_item_id)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.vat_percentage)
            .bind(item.total_price)
            .bind(item.vat_amount)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Σ total_amount of a customer's issued (or applied) credit notes.
    pub async fn issued_total_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM credit_notes
            WHERE customer_id = ?1 AND status IN ('ISSUED', 'APPLIED')
            "#,
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
        Ok(total)
    }
}
