//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: Absolute update (loses concurrent changes)              │
//! │     UPDATE products SET stock_quantity = 7 WHERE id = ?            │
//! │                                                                     │
//! │  ✅ CORRECT: Delta update inside a WriteTx                         │
//! │     UPDATE products SET stock_quantity = stock_quantity - 300      │
//! │     ... RETURNING stock_quantity                                   │
//! │                                                                     │
//! │  Order line A takes 3, receipt B adds 2: the row ends at -3 + 2    │
//! │  no matter which transaction commits first.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `stock_quantity` is never written any other way; the stock ledger in
//! emporos-ledger pairs every delta with a `stock_movements` row.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporos_core::{Product, Quantity};

const PRODUCT_COLUMNS: &str = r#"
    id, code, name, unit_of_measurement,
    price, cost_price, vat_percentage,
    stock_quantity, min_stock_level, is_active,
    created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Gets a product by its code (e.g. "SKU1").
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_code(&mut conn, code).await
    }

    /// Lists active products ordered by code.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY code LIMIT ?1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Active products at or below their reorder level.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock_quantity <= min_stock_level ORDER BY code"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    /// Reads a product on the given connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(product)
    }

    pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code)
            .fetch_optional(conn)
            .await?;
        Ok(product)
    }

    /// Reads a product for a read-modify-write.
    ///
    /// Must run inside a `WriteTx`: the transaction already holds the
    /// write lock, so the row cannot change until commit.
    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, code = %product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, unit_of_measurement,
                price, cost_price, vat_percentage,
                stock_quantity, min_stock_level, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.unit_of_measurement)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.vat_percentage)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds `delta` to the on-hand quantity and returns the new quantity.
    pub async fn apply_stock_delta(
        conn: &mut SqliteConnection,
        id: &str,
        delta: Quantity,
        now: DateTime<Utc>,
    ) -> DbResult<Quantity> {
        debug!(id = %id, delta = %delta, "Updating stock");

        let quantity: Option<Quantity> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        quantity.ok_or_else(|| DbError::not_found("Product", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::fixtures::sample_product;
    use emporos_core::{Money, Percent, UnitOfMeasure};

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("SKU1", 20);

        let mut tx = db.begin_write().await.unwrap();
        ProductRepository::insert(tx.conn(), &product).await.unwrap();
        tx.commit().await.unwrap();

        let stored = db.products().get_by_code("SKU1").await.unwrap().unwrap();
        assert_eq!(stored.id, product.id);
        assert_eq!(stored.price, Money::from_cents(10_000));
        assert_eq!(stored.vat_percentage, Percent::whole(24));
        assert_eq!(stored.stock_quantity, Quantity::units(20));
        assert_eq!(stored.unit_of_measurement, UnitOfMeasure::Pcs);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        ProductRepository::insert(tx.conn(), &sample_product("SKU1", 0)).await.unwrap();
        let err = ProductRepository::insert(tx.conn(), &sample_product("SKU1", 0))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("products.code"));
    }

    #[tokio::test]
    async fn test_apply_stock_delta() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample_product("SKU1", 20);

        let mut tx = db.begin_write().await.unwrap();
        ProductRepository::insert(tx.conn(), &product).await.unwrap();
        let after = ProductRepository::apply_stock_delta(
            tx.conn(),
            &product.id,
            Quantity::units(-5),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(after, Quantity::units(15));

        let missing =
            ProductRepository::apply_stock_delta(tx.conn(), "nope", Quantity::units(1), Utc::now())
                .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }
}
