//! # Write Transactions
//!
//! Every ledger-mutating operation runs inside one [`WriteTx`].
//!
//! ## Locking on SQLite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no row locks. A plain BEGIN is "deferred": two writers     │
//! │  can both read stock = 10, then race to write 13.                      │
//! │                                                                         │
//! │  WriteTx::begin                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │  UPDATE ledger_write_lock SET generation = generation + 1              │
//! │       │    ← first statement is a write: the database write lock is    │
//! │       │      taken before anything is read (same as BEGIN IMMEDIATE)   │
//! │       │    ← a second writer waits here (busy_timeout)                 │
//! │       ▼                                                                 │
//! │  lock_for_update reads, deltas, postings, audit row                    │
//! │       │                                                                 │
//! │       ├── commit()  → everything visible at once                       │
//! │       └── drop / ?  → rolled back, nothing visible                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only one connection is held per transaction. Code running inside a
//! `WriteTx` must read through [`WriteTx::conn`], never through the pool:
//! with a single-connection pool (in-memory tests) a pool read would wait
//! for the connection this transaction is holding.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// An open write transaction holding the database write lock.
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
}

impl WriteTx {
    /// Opens a transaction and takes the write lock.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("UPDATE ledger_write_lock SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;

        debug!("Write transaction started");
        Ok(WriteTx { tx })
    }

    /// The connection to run statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commits all effects.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Write transaction committed");
        Ok(())
    }

    /// Discards all effects. Dropping the transaction does the same.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    async fn generation(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT generation FROM ledger_write_lock WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_keeps_effects() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let before = generation(&db).await;

        let tx = db.begin_write().await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(generation(&db).await, before + 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let before = generation(&db).await;

        {
            let mut tx = db.begin_write().await.unwrap();
            sqlx::query(
                "INSERT INTO suppliers (id, name, vat_number, created_at) VALUES ('s1', 'Acme', NULL, '2025-01-01T00:00:00Z')",
            )
            .execute(tx.conn())
            .await
            .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(generation(&db).await, before);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let before = generation(&db).await;

        let tx = db.begin_write().await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(generation(&db).await, before);
    }
}
