//! # Stock Ledger
//!
//! The only path that changes `products.stock_quantity`.
//!
//! ```text
//! adjust(product, −3, OrderLine, "ORDER-2025-0007")
//!      │
//!      ├── UPDATE products SET stock_quantity = stock_quantity + (−3) RETURNING …
//!      └── INSERT INTO stock_movements (product, −3, order_line, ORDER-2025-0007)
//! ```
//!
//! Both statements run on the caller's `WriteTx`. A delta is applied as
//! given: callers apply it once per event, and line edits pass
//! `new − stock_applied`, never a recomputed absolute value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use emporos_core::{new_id, Quantity, StockMovement, StockReason};
use emporos_db::{JournalRepository, ProductRepository};

use crate::error::LedgerResult;

/// Applies `delta` to a product and journals it. Returns the new quantity.
///
/// A zero delta writes nothing.
pub async fn adjust(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: Quantity,
    reason: StockReason,
    reference: Option<&str>,
    now: DateTime<Utc>,
) -> LedgerResult<Quantity> {
    if delta.is_zero() {
        let product = ProductRepository::lock_for_update(conn, product_id).await?;
        return Ok(product.stock_quantity);
    }

    let quantity = ProductRepository::apply_stock_delta(conn, product_id, delta, now).await?;

    let movement = StockMovement {
        id: new_id(),
        product_id: product_id.to_string(),
        delta,
        reason,
        reference: reference.map(str::to_string),
        created_at: now,
    };
    JournalRepository::insert_stock_movement(conn, &movement).await?;

    Ok(quantity)
}

/// On-hand quantity next to the sum of its journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockConservation {
    pub recorded: Quantity,
    pub journal: Quantity,
}

impl StockConservation {
    pub fn holds(&self) -> bool {
        self.recorded == self.journal
    }
}

pub async fn conservation(conn: &mut SqliteConnection, product_id: &str) -> LedgerResult<StockConservation> {
    let product = ProductRepository::lock_for_update(conn, product_id).await?;
    let journal = JournalRepository::stock_sum(conn, product_id).await?;

    Ok(StockConservation {
        recorded: product.stock_quantity,
        journal,
    })
}
