//! # Ledger Facade
//!
//! Entry point for every operation that moves stock, money or a status.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ledger.cancel_order(id, &actor)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  begin_write()              ← write lock taken, waits on busy_timeout  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate ─► number ─► stock ─► balance ─► status ─► audit             │
//! │       │                                                                 │
//! │       ├── Err  → warn!, WriteTx dropped, nothing visible               │
//! │       └── Ok   → commit(), info!, updated document returned            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The acting user is always an explicit [`Actor`] argument.
//! Operations themselves live in [`crate::lifecycle`], one module per
//! document family, as `impl Ledger` blocks.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use emporos_core::{
    ActionKind, ActivityLog, Actor, CommissionStatus, Lifecycle, Quantity, StockReason,
};
use emporos_db::{ActivityFilter, CommissionRepository, Database, ProductRepository, WriteTx};

use crate::audit::{self, Subject};
use crate::balance::{self, Reconciliation};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::stock::{self, StockConservation};

/// The ledger engine.
///
/// Cheap to clone: the database handle is a reference-counted pool.
///
/// ## Example
/// ```rust,ignore
/// let ledger = Ledger::open(LedgerConfig::from_env()?).await?;
/// let order = ledger.create_order(new_order, &actor).await?;
/// let invoice = ledger.create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    config: LedgerConfig,
}

impl Ledger {
    /// Opens the database described by `config` and runs migrations.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Ledger::new(db, config))
    }

    pub fn new(db: Database, config: LedgerConfig) -> Self {
        Ledger { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn numbering_retries(&self) -> u32 {
        self.config.numbering_retries
    }

    pub(crate) async fn begin_write(&self) -> LedgerResult<WriteTx> {
        Ok(self.db.begin_write().await?)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Manual stock correction.
    ///
    /// Returns the new on-hand quantity.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: Quantity,
        note: &str,
        actor: &Actor,
    ) -> LedgerResult<Quantity> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let product = ProductRepository::lock_for_update(tx.conn(), product_id).await?;
            let quantity =
                stock::adjust(tx.conn(), product_id, delta, StockReason::Adjustment, Some(note), now)
                    .await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::Update,
                Subject::new("Product", &product.id, &product.code),
                format!("Stock adjusted by {delta}: {note}"),
                now,
            )
            .await?;
            Ok::<_, LedgerError>((product, quantity))
        }
        .await;
        let (product, quantity) = result.map_err(|e| rejected("adjust_stock", e))?;

        tx.commit().await?;
        info!(code = %product.code, delta = %delta, stock = %quantity, actor = %actor.name, "Stock adjusted");
        Ok(quantity)
    }

    /// On-hand quantity against the stock movement journal.
    pub async fn stock_conservation(&self, product_id: &str) -> LedgerResult<StockConservation> {
        let mut tx = self.db.pool().begin().await?;
        stock::conservation(&mut tx, product_id).await
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Recorded, derived and journal balance of a customer, read from one snapshot.
    pub async fn reconcile_customer(&self, customer_id: &str) -> LedgerResult<Reconciliation> {
        let mut tx = self.db.pool().begin().await?;
        let reconciliation = balance::reconcile(&mut tx, customer_id).await?;

        if !reconciliation.is_consistent() {
            warn!(
                customer = %customer_id,
                recorded = %reconciliation.recorded,
                derived = %reconciliation.derived,
                journal = %reconciliation.journal,
                "Customer balance out of step"
            );
        }
        Ok(reconciliation)
    }

    // =========================================================================
    // Commissions
    // =========================================================================

    /// Moves unpaid commissions to paid. Returns how many moved.
    ///
    /// Ids that are already paid are skipped; unknown ids are an error.
    pub async fn mark_commissions_paid(
        &self,
        ids: &[String],
        paid_date: NaiveDate,
        actor: &Actor,
    ) -> LedgerResult<usize> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let mut moved = 0;
            for id in ids {
                let commission = CommissionRepository::find(tx.conn(), id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Commission", id.as_str()))?;
                if !commission.status.allows(CommissionStatus::Paid) {
                    continue;
                }
                if CommissionRepository::mark_paid(tx.conn(), id, paid_date).await? {
                    audit::record(
                        tx.conn(),
                        actor,
                        ActionKind::StatusChange,
                        Subject::new("Commission", id, &commission.invoice_id),
                        format!("Commission {} paid", commission.calculated_amount),
                        now,
                    )
                    .await?;
                    moved += 1;
                }
            }
            Ok::<_, LedgerError>(moved)
        }
        .await;
        let moved = result.map_err(|e| rejected("mark_commissions_paid", e))?;

        tx.commit().await?;
        info!(count = moved, actor = %actor.name, "Commissions marked paid");
        Ok(moved)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Login / logout, reported by the authentication layer.
    pub async fn record_session_event(&self, actor: &Actor, kind: ActionKind) -> LedgerResult<()> {
        if !matches!(kind, ActionKind::Login | ActionKind::Logout) {
            return Err(rejected(
                "record_session_event",
                emporos_core::ValidationError::NotAllowed {
                    field: "action_kind".to_string(),
                    allowed: vec!["LOGIN".to_string(), "LOGOUT".to_string()],
                }
                .into(),
            ));
        }

        let mut tx = self.begin_write().await?;
        audit::record_session(tx.conn(), actor, kind, Utc::now()).await?;
        tx.commit().await?;
        info!(actor = %actor.name, kind = ?kind, "Session event recorded");
        Ok(())
    }

    /// Audit entries, newest first.
    pub async fn activity(&self, filter: &ActivityFilter) -> LedgerResult<Vec<ActivityLog>> {
        Ok(self.db.activity_log().list(filter).await?)
    }
}

/// Logs a rejected operation and hands the error back.
pub(crate) fn rejected(operation: &'static str, err: LedgerError) -> LedgerError {
    warn!(operation, kind = ?err.kind(), error = %err, "Operation rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ledger, product_input};

    #[tokio::test]
    async fn test_adjust_stock_is_journaled() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();

        let quantity = ledger
            .adjust_stock(&product.id, Quantity::units(-4), "breakage", &actor)
            .await
            .unwrap();
        assert_eq!(quantity, Quantity::units(16));

        let conservation = ledger.stock_conservation(&product.id).await.unwrap();
        assert!(conservation.holds());

        let movements = ledger.database().journals().movements_for_product(&product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().any(|m| m.reason == StockReason::Adjustment));
    }

    #[tokio::test]
    async fn test_session_events() {
        let ledger = ledger().await;
        let actor = Actor::new("u1", "maria");

        ledger.record_session_event(&actor, ActionKind::Login).await.unwrap();
        let err = ledger
            .record_session_event(&actor, ActionKind::Delete)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let filter = ActivityFilter {
            actor_id: Some("u1".to_string()),
            ..ActivityFilter::default()
        };
        let entries = ledger.activity(&filter).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_kind, ActionKind::Login);
    }

    #[tokio::test]
    async fn test_rejected_operation_leaves_no_trace() {
        let ledger = ledger().await;
        let actor = Actor::system();

        let err = ledger
            .adjust_stock("missing", Quantity::units(1), "x", &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);

        let entries = ledger.activity(&ActivityFilter::default()).await.unwrap();
        assert!(entries.is_empty());
    }
}
