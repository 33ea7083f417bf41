//! # Supplier Repository
//!
//! Purchase orders reference a supplier; nothing else here carries
//! ledger side effects.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::Supplier;

/// Repository for supplier operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, vat_number, created_at FROM suppliers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, vat_number, created_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(supplier)
    }

    /// Inserts a supplier. Names are unique.
    pub async fn insert(conn: &mut SqliteConnection, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query("INSERT INTO suppliers (id, name, vat_number, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&supplier.id)
            .bind(&supplier.name)
            .bind(&supplier.vat_number)
            .bind(supplier.created_at)
            .execute(conn)
            .await?;

        Ok(())
    }
}
