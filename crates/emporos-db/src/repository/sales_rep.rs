//! # Sales Rep Repository
//!
//! Sales representatives and agents with their commission rate.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::SalesRep;

const SALES_REP_COLUMNS: &str = "id, name, rep_type, commission_rate, phone, created_at";

/// Repository for sales rep operations.
#[derive(Debug, Clone)]
pub struct SalesRepRepository {
    pool: SqlitePool,
}

impl SalesRepRepository {
    /// Creates a new SalesRepRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesRepRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesRep>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn list(&self) -> DbResult<Vec<SalesRep>> {
        let sql = format!("SELECT {SALES_REP_COLUMNS} FROM sales_reps ORDER BY name");
        let reps = sqlx::query_as::<_, SalesRep>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(reps)
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SalesRep>> {
        let sql = format!("SELECT {SALES_REP_COLUMNS} FROM sales_reps WHERE id = ?1");
        let rep = sqlx::query_as::<_, SalesRep>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(rep)
    }

    pub async fn insert(conn: &mut SqliteConnection, rep: &SalesRep) -> DbResult<()> {
        debug!(id = %rep.id, name = %rep.name, "Inserting sales rep");

        sqlx::query(
            r#"
            INSERT INTO sales_reps (id, name, rep_type, commission_rate, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&rep.id)
        .bind(&rep.name)
        .bind(rep.rep_type)
        .bind(rep.commission_rate)
        .bind(&rep.phone)
        .bind(rep.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
