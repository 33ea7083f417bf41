//! # Purchase Orders
//!
//! ```text
//! ┌───────┐ ordered ┌─────────┐ receive ┌────────────────────┐ receive ┌───────────┐
//! │ DRAFT │────────►│ ORDERED │────────►│ PARTIALLY_RECEIVED │────────►│ COMPLETED │
//! └───┬───┘         └────┬────┘         └─────────┬──────────┘         └───────────┘
//!     └──────────────────┴────────────────────────┴──► CANCELLED
//! ```
//!
//! Receiving creates one stock receipt per line; the receipt moves the stock.
//! A batch is accepted or rejected as a whole.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use emporos_core::pricing::purchase_line_cost;
use emporos_core::validation::{validate_line_quantity, validate_price, validate_within_limit};
use emporos_core::{
    new_id, ActionKind, Actor, Lifecycle, Money, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus, Quantity, ValidationError,
};
use emporos_db::{ProductRepository, PurchaseOrderRepository, SupplierRepository};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::lifecycle::stock_receipts::insert_receipt;
use crate::numbering::insert_numbered;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrderLine {
    pub product_id: String,
    pub quantity: Quantity,
    /// Defaults to the product's cost price.
    pub cost_price: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<NewPurchaseOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub item_id: String,
    pub quantity: Quantity,
}

impl Ledger {
    pub async fn create_purchase_order(
        &self,
        input: NewPurchaseOrder,
        actor: &Actor,
    ) -> LedgerResult<PurchaseOrder> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let result = async {
            let supplier = SupplierRepository::find(tx.conn(), &input.supplier_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Supplier", input.supplier_id.as_str()))?;

            let mut order = PurchaseOrder {
                id: new_id(),
                po_number: String::new(),
                supplier_id: supplier.id.clone(),
                order_date: input.order_date,
                expected_delivery_date: input.expected_delivery_date,
                status: PurchaseOrderStatus::Draft,
                total_amount: Money::zero(),
                notes: input.notes,
                created_at: now,
            };
            let mut items = build_lines(tx.conn(), &order.id, &input.lines).await?;
            order.total_amount = items.iter().map(|item| item.total_cost).sum();

            insert_numbered(tx.conn(), &mut order, attempts).await?;
            for item in &mut items {
                item.purchase_order_id = order.id.clone();
                PurchaseOrderRepository::insert_item(tx.conn(), item).await?;
            }

            audit::record(
                tx.conn(),
                actor,
                ActionKind::Create,
                Subject::new("PurchaseOrder", &order.id, &order.po_number),
                format!("From {}, total {}", supplier.name, order.total_amount),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(order)
        }
        .await;
        let order = result.map_err(|e| rejected("create_purchase_order", e))?;

        tx.commit().await?;
        info!(number = %order.po_number, total = %order.total_amount, actor = %actor.name, "Purchase order created");
        Ok(order)
    }

    /// Replaces the lines of a purchase order that has received nothing.
    pub async fn update_purchase_order_lines(
        &self,
        id: &str,
        lines: Vec<NewPurchaseOrderLine>,
        actor: &Actor,
    ) -> LedgerResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let mut order = PurchaseOrderRepository::lock_for_update(tx.conn(), id).await?;
            if !matches!(order.status, PurchaseOrderStatus::Draft | PurchaseOrderStatus::Ordered) {
                return Err(LedgerError::precondition(
                    "PurchaseOrder",
                    &order.po_number,
                    format!("lines are fixed once {}", order.status),
                ));
            }
            ensure_nothing_received(tx.conn(), &order).await?;

            let items = build_lines(tx.conn(), &order.id, &lines).await?;
            PurchaseOrderRepository::delete_items(tx.conn(), &order.id).await?;
            for item in &items {
                PurchaseOrderRepository::insert_item(tx.conn(), item).await?;
            }
            order.total_amount = items.iter().map(|item| item.total_cost).sum();
            PurchaseOrderRepository::set_total(tx.conn(), &order.id, order.total_amount).await?;

            audit::record(
                tx.conn(),
                actor,
                ActionKind::Update,
                Subject::new("PurchaseOrder", &order.id, &order.po_number),
                format!("{} line(s), total {}", items.len(), order.total_amount),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(order)
        }
        .await;
        let order = result.map_err(|e| rejected("update_purchase_order_lines", e))?;

        tx.commit().await?;
        info!(number = %order.po_number, total = %order.total_amount, actor = %actor.name, "Purchase order lines replaced");
        Ok(order)
    }

    pub async fn mark_purchase_order_ordered(&self, id: &str, actor: &Actor) -> LedgerResult<PurchaseOrder> {
        self.move_purchase_order(id, PurchaseOrderStatus::Ordered, "mark_purchase_order_ordered", actor)
            .await
    }

    pub async fn cancel_purchase_order(&self, id: &str, actor: &Actor) -> LedgerResult<PurchaseOrder> {
        self.move_purchase_order(id, PurchaseOrderStatus::Cancelled, "cancel_purchase_order", actor)
            .await
    }

    /// Receives goods against purchase order lines.
    ///
    /// Zero-quantity lines are ignored. Any line over its remaining quantity
    /// rejects the whole batch.
    pub async fn receive_purchase_order(
        &self,
        id: &str,
        lines: Vec<ReceiveLine>,
        actor: &Actor,
    ) -> LedgerResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let order = receive_in(tx.conn(), id, &lines, actor, now)
            .await
            .map_err(|e| rejected("receive_purchase_order", e))?;

        tx.commit().await?;
        info!(number = %order.po_number, status = %order.status, actor = %actor.name, "Purchase order received");
        Ok(order)
    }

    /// Deletes a purchase order that has received nothing.
    pub async fn delete_purchase_order(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let order = PurchaseOrderRepository::lock_for_update(tx.conn(), id).await?;
            ensure_nothing_received(tx.conn(), &order).await?;

            PurchaseOrderRepository::delete_items(tx.conn(), &order.id).await?;
            PurchaseOrderRepository::delete(tx.conn(), &order.id).await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::Delete,
                Subject::new("PurchaseOrder", &order.id, &order.po_number),
                "Deleted",
                now,
            )
            .await?;
            Ok::<_, LedgerError>(order)
        }
        .await;
        let order = result.map_err(|e| rejected("delete_purchase_order", e))?;

        tx.commit().await?;
        info!(number = %order.po_number, actor = %actor.name, "Purchase order deleted");
        Ok(())
    }

    async fn move_purchase_order(
        &self,
        id: &str,
        next: PurchaseOrderStatus,
        operation: &'static str,
        actor: &Actor,
    ) -> LedgerResult<PurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let mut order = PurchaseOrderRepository::lock_for_update(tx.conn(), id).await?;
            let from = order.status;
            order.status = order.status.transition_to(next)?;
            PurchaseOrderRepository::set_status(tx.conn(), &order.id, order.status).await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::StatusChange,
                Subject::new("PurchaseOrder", &order.id, &order.po_number),
                format!("{from} → {}", order.status),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(order)
        }
        .await;
        let order = result.map_err(|e| rejected(operation, e))?;

        tx.commit().await?;
        info!(number = %order.po_number, status = %order.status, actor = %actor.name, "Purchase order status changed");
        Ok(order)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

async fn receive_in(
    conn: &mut SqliteConnection,
    id: &str,
    lines: &[ReceiveLine],
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<PurchaseOrder> {
    let mut order = PurchaseOrderRepository::lock_for_update(conn, id).await?;
    if !order.status.accepts_receipts() {
        return Err(LedgerError::precondition(
            "PurchaseOrder",
            &order.po_number,
            format!("a {} purchase order receives nothing", order.status),
        ));
    }

    let items: HashMap<String, PurchaseOrderItem> = PurchaseOrderRepository::items(conn, &order.id)
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    // Validation pass over the whole batch.
    let mut requested: HashMap<&str, Quantity> = HashMap::new();
    let mut accepted = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        if line.quantity.is_zero() {
            continue;
        }
        let item = items.get(&line.item_id).ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "item_id".to_string(),
                reason: format!("not a line of {}", order.po_number),
            }
            .at_line(line_no)
        })?;
        let product = ProductRepository::lock_for_update(conn, &item.product_id).await?;
        validate_line_quantity(line.quantity, Some(product.unit_of_measurement))
            .map_err(|e| e.at_line(line_no))?;

        let total = requested.entry(item.id.as_str()).or_insert_with(Quantity::zero);
        *total += line.quantity;
        validate_within_limit("quantity", *total, item.remaining()).map_err(|e| e.at_line(line_no))?;

        accepted.push((item, product, line.quantity));
    }
    if accepted.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let notes = format!("Receipt from purchase order {}", order.po_number);
    for (item, product, quantity) in &accepted {
        PurchaseOrderRepository::add_received(conn, &item.id, *quantity).await?;
        insert_receipt(conn, product, *quantity, Some(item.id.clone()), Some(notes.clone()), actor, now).await?;
    }

    let from = order.status;
    order.status = sync_status(conn, &order).await?;
    audit::record(
        conn,
        actor,
        ActionKind::Update,
        Subject::new("PurchaseOrder", &order.id, &order.po_number),
        format!("Received {} line(s), {from} → {}", accepted.len(), order.status),
        now,
    )
    .await?;

    Ok(order)
}

/// Recomputes a purchase order's status from its received quantities.
///
/// Cancelled orders keep their status.
pub(crate) async fn sync_status(
    conn: &mut SqliteConnection,
    order: &PurchaseOrder,
) -> LedgerResult<PurchaseOrderStatus> {
    if order.status == PurchaseOrderStatus::Cancelled {
        return Ok(order.status);
    }

    let items = PurchaseOrderRepository::items(conn, &order.id).await?;
    let all_received = !items.is_empty() && items.iter().all(PurchaseOrderItem::is_fully_received);
    let any_received = items.iter().any(|item| item.quantity_received.is_positive());
    let status = PurchaseOrderStatus::from_progress(all_received, any_received);

    if status != order.status {
        debug!(number = %order.po_number, from = %order.status, to = %status, "Purchase order progress");
        PurchaseOrderRepository::set_status(conn, &order.id, status).await?;
    }
    Ok(status)
}

async fn build_lines(
    conn: &mut SqliteConnection,
    purchase_order_id: &str,
    lines: &[NewPurchaseOrderLine],
) -> LedgerResult<Vec<PurchaseOrderItem>> {
    if lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let mut items = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        let product = ProductRepository::find(conn, &line.product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", line.product_id.as_str()))?;
        validate_line_quantity(line.quantity, Some(product.unit_of_measurement))
            .map_err(|e| e.at_line(line_no))?;
        let cost_price = line.cost_price.unwrap_or(product.cost_price);
        validate_price("cost_price", cost_price).map_err(|e| e.at_line(line_no))?;

        items.push(PurchaseOrderItem {
            id: new_id(),
            purchase_order_id: purchase_order_id.to_string(),
            product_id: product.id,
            quantity: line.quantity,
            quantity_received: Quantity::zero(),
            cost_price,
            total_cost: purchase_line_cost(line.quantity, cost_price),
        });
    }
    Ok(items)
}

async fn ensure_nothing_received(conn: &mut SqliteConnection, order: &PurchaseOrder) -> LedgerResult<()> {
    let items = PurchaseOrderRepository::items(conn, &order.id).await?;
    if items.iter().any(|item| item.quantity_received.is_positive()) {
        return Err(LedgerError::precondition(
            "PurchaseOrder",
            &order.po_number,
            "goods have already been received",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{ledger, product_input, stock_of};

    async fn draft_order(ledger: &Ledger, units: i64) -> (PurchaseOrder, emporos_core::Product) {
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 10), &actor).await.unwrap();
        let supplier = ledger.create_supplier("Acme Supplies", None, &actor).await.unwrap();
        let order = ledger
            .create_purchase_order(
                NewPurchaseOrder {
                    supplier_id: supplier.id,
                    order_date: Utc::now().date_naive(),
                    expected_delivery_date: None,
                    notes: None,
                    lines: vec![NewPurchaseOrderLine {
                        product_id: product.id.clone(),
                        quantity: Quantity::units(units),
                        cost_price: Some(Money::from_cents(4_000)),
                    }],
                },
                &actor,
            )
            .await
            .unwrap();
        (order, product)
    }

    fn receive(item_id: &str, units: i64) -> ReceiveLine {
        ReceiveLine {
            item_id: item_id.to_string(),
            quantity: Quantity::units(units),
        }
    }

    #[tokio::test]
    async fn test_create_totals() {
        let ledger = ledger().await;
        let (order, _product) = draft_order(&ledger, 5).await;

        assert!(order.po_number.starts_with("PO-"));
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
        assert_eq!(order.total_amount, Money::from_cents(20_000));
    }

    #[tokio::test]
    async fn test_receive_in_two_batches() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, product) = draft_order(&ledger, 5).await;
        ledger.mark_purchase_order_ordered(&order.id, &actor).await.unwrap();
        let items = ledger.database().purchase_orders().get_items(&order.id).await.unwrap();

        let partly = ledger
            .receive_purchase_order(&order.id, vec![receive(&items[0].id, 2)], &actor)
            .await
            .unwrap();
        assert_eq!(partly.status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(12));

        let done = ledger
            .receive_purchase_order(&order.id, vec![receive(&items[0].id, 3)], &actor)
            .await
            .unwrap();
        assert_eq!(done.status, PurchaseOrderStatus::Completed);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));

        let receipts = ledger
            .database()
            .stock_receipts()
            .list_for_purchase_order_item(&items[0].id)
            .await
            .unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(
            receipts[0].notes.as_deref(),
            Some(format!("Receipt from purchase order {}", order.po_number).as_str())
        );

        let err = ledger
            .receive_purchase_order(&order.id, vec![receive(&items[0].id, 1)], &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_over_receipt_rejects_batch() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, product) = draft_order(&ledger, 5).await;
        let items = ledger.database().purchase_orders().get_items(&order.id).await.unwrap();

        let err = ledger
            .receive_purchase_order(
                &order.id,
                vec![receive(&items[0].id, 3), receive(&items[0].id, 3)],
                &actor,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(10));

        let items = ledger.database().purchase_orders().get_items(&order.id).await.unwrap();
        assert_eq!(items[0].quantity_received, Quantity::zero());

        let err = ledger
            .receive_purchase_order(&order.id, vec![receive(&items[0].id, 0)], &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_received_order_is_fixed() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, product) = draft_order(&ledger, 5).await;
        let items = ledger.database().purchase_orders().get_items(&order.id).await.unwrap();
        ledger
            .receive_purchase_order(&order.id, vec![receive(&items[0].id, 1)], &actor)
            .await
            .unwrap();

        let line = NewPurchaseOrderLine {
            product_id: product.id.clone(),
            quantity: Quantity::units(8),
            cost_price: None,
        };
        let err = ledger
            .update_purchase_order_lines(&order.id, vec![line], &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = ledger.delete_purchase_order(&order.id, &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let cancelled = ledger.cancel_purchase_order(&order.id, &actor).await.unwrap();
        assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_and_delete_draft() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, product) = draft_order(&ledger, 5).await;

        let line = NewPurchaseOrderLine {
            product_id: product.id.clone(),
            quantity: Quantity::units(8),
            cost_price: None,
        };
        let updated = ledger
            .update_purchase_order_lines(&order.id, vec![line], &actor)
            .await
            .unwrap();
        // Product cost price 60.00
        assert_eq!(updated.total_amount, Money::from_cents(48_000));

        ledger.delete_purchase_order(&order.id, &actor).await.unwrap();
        assert!(ledger.database().purchase_orders().get_by_id(&order.id).await.unwrap().is_none());
    }
}
