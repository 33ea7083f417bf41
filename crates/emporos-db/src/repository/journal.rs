//! # Journal Repository
//!
//! The two append-only journals behind the incremental counters:
//!
//! ```text
//! products.stock_quantity  ══  Σ stock_movements.delta    (per product)
//! customers.balance        ══  Σ balance_postings.amount  (per customer)
//! ```
//!
//! Rows are only ever inserted, in the same transaction as the counter
//! update they describe.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::{BalancePosting, Money, Quantity, StockMovement};

const STOCK_MOVEMENT_COLUMNS: &str = "id, product_id, delta, reason, reference, created_at";

const BALANCE_POSTING_COLUMNS: &str = "id, customer_id, amount, kind, reference, created_at";

/// Repository for the stock and balance journals.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    /// Creates a new JournalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Stock movements of a product, oldest first.
    pub async fn movements_for_product(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {STOCK_MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Balance postings of a customer, oldest first.
    pub async fn postings_for_customer(&self, customer_id: &str) -> DbResult<Vec<BalancePosting>> {
        let sql = format!(
            "SELECT {BALANCE_POSTING_COLUMNS} FROM balance_postings WHERE customer_id = ?1 ORDER BY rowid"
        );
        let postings = sqlx::query_as::<_, BalancePosting>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(postings)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn insert_stock_movement(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
        debug!(product_id = %movement.product_id, delta = %movement.delta, reason = ?movement.reason, "Journaling stock movement");

        let sql = format!("INSERT INTO stock_movements ({STOCK_MOVEMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)");
        sqlx::query(&sql)
            .bind(&movement.id)
            .bind(&movement.product_id)
            .bind(movement.delta)
            .bind(movement.reason)
            .bind(&movement.reference)
            .bind(movement.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Σ delta over every movement of the product.
    pub async fn stock_sum(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Quantity> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM stock_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(conn)
        .await?;
        Ok(Quantity::from_hundredths(sum))
    }

    pub async fn insert_posting(conn: &mut SqliteConnection, posting: &BalancePosting) -> DbResult<()> {
        debug!(customer_id = %posting.customer_id, amount = %posting.amount, kind = ?posting.kind, "Journaling balance posting");

        let sql = format!("INSERT INTO balance_postings ({BALANCE_POSTING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)");
        sqlx::query(&sql)
            .bind(&posting.id)
            .bind(&posting.customer_id)
            .bind(posting.amount)
            .bind(posting.kind)
            .bind(&posting.reference)
            .bind(posting.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Σ amount over every posting of the customer.
    pub async fn posting_sum(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Money> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM balance_postings WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
        Ok(Money::from_cents(sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::fixtures::sample_product;
    use crate::repository::product::ProductRepository;
    use chrono::Utc;
    use emporos_core::{new_id, StockReason};

    #[tokio::test]
    async fn test_stock_sum_over_movements() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("SKU1", 0);

        let mut tx = db.begin_write().await.unwrap();
        ProductRepository::insert(tx.conn(), &product).await.unwrap();
        for (delta, reason) in [(20, StockReason::OpeningBalance), (-5, StockReason::OrderLine)] {
            let movement = StockMovement {
                id: new_id(),
                product_id: product.id.clone(),
                delta: Quantity::units(delta),
                reason,
                reference: Some("ORDER-2025-0001".to_string()),
                created_at: Utc::now(),
            };
            JournalRepository::insert_stock_movement(tx.conn(), &movement).await.unwrap();
        }
        let sum = JournalRepository::stock_sum(tx.conn(), &product.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(sum, Quantity::units(15));
        let movements = db.journals().movements_for_product(&product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].reason, StockReason::OrderLine);
    }

    #[tokio::test]
    async fn test_posting_sum_empty_is_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let sum = JournalRepository::posting_sum(&mut conn, "nobody").await.unwrap();
        assert_eq!(sum, Money::zero());
    }
}
