//! # Counter Repository
//!
//! Storage side of document numbering.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ document_counters                                                    │
//! │  prefix │ year │ last_value                                          │
//! │  INV    │ 2025 │ 12         ← next INV-2025 number is 13             │
//! │  CUSTOMER │ 0  │ 41         ← customer codes have no year            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `increment` is a single `INSERT … ON CONFLICT DO UPDATE … RETURNING`
//! statement, so two writers can never read the same value. Seeding from
//! already persisted numbers is the caller's job.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for the numbering counters.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    /// Creates a new CounterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Last value handed out for a prefix and year.
    pub async fn get(&self, prefix: &str, year: i32) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::current(&mut conn, prefix, year).await
    }

    // =========================================================================
    // Inside a write transaction
    // =========================================================================

    pub async fn current(conn: &mut SqliteConnection, prefix: &str, year: i32) -> DbResult<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM document_counters WHERE prefix = ?1 AND year = ?2",
        )
        .bind(prefix)
        .bind(year)
        .fetch_optional(conn)
        .await?;
        Ok(value)
    }

    /// Hands out the next value.
    ///
    /// A missing counter row starts at `seed + 1`.
    pub async fn increment(conn: &mut SqliteConnection, prefix: &str, year: i32, seed: i64) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_counters (prefix, year, last_value)
            VALUES (?1, ?2, ?3 + 1)
            ON CONFLICT(prefix, year) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .bind(year)
        .bind(seed)
        .fetch_one(conn)
        .await?;

        debug!(prefix = %prefix, year = year, value = value, "Counter incremented");
        Ok(value)
    }

    /// Lexically highest value of `table.column` starting with `like_prefix`.
    ///
    /// `table` and `column` come from a fixed list, never from input.
    pub async fn highest_number(
        conn: &mut SqliteConnection,
        table: &'static str,
        column: &'static str,
        like_prefix: &str,
    ) -> DbResult<Option<String>> {
        let sql = format!(
            "SELECT {column} FROM {table} WHERE {column} LIKE ?1 || '%' ORDER BY {column} DESC LIMIT 1"
        );
        let number: Option<String> = sqlx::query_scalar(&sql)
            .bind(like_prefix)
            .fetch_optional(conn)
            .await?;
        Ok(number)
    }

    /// How many values of `table.column` start with `like_prefix`.
    pub async fn count_numbers(
        conn: &mut SqliteConnection,
        table: &'static str,
        column: &'static str,
        like_prefix: &str,
    ) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} LIKE ?1 || '%'");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(like_prefix)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_increment_seeds_then_counts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(CounterRepository::current(tx.conn(), "INV", 2025).await.unwrap(), None);
        assert_eq!(CounterRepository::increment(tx.conn(), "INV", 2025, 7).await.unwrap(), 8);
        assert_eq!(CounterRepository::increment(tx.conn(), "INV", 2025, 7).await.unwrap(), 9);
        assert_eq!(CounterRepository::increment(tx.conn(), "INV", 2026, 0).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(db.counters().get("INV", 2025).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_highest_number_is_lexical() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        for (id, name) in [("s1", "PO-2025-00002"), ("s2", "PO-2025-00010"), ("s3", "PO-2024-00099")] {
            sqlx::query("INSERT INTO suppliers (id, name, vat_number, created_at) VALUES (?1, ?2, NULL, '2025-01-01T00:00:00Z')")
                .bind(id)
                .bind(name)
                .execute(tx.conn())
                .await
                .unwrap();
        }
        let highest = CounterRepository::highest_number(tx.conn(), "suppliers", "name", "PO-2025-")
            .await
            .unwrap();
        let count = CounterRepository::count_numbers(tx.conn(), "suppliers", "name", "PO-2025-")
            .await
            .unwrap();

        assert_eq!(highest.as_deref(), Some("PO-2025-00010"));
        assert_eq!(count, 2);
    }
}
