//! # Stock Receipts
//!
//! Goods coming in, either entered directly or received against a
//! purchase order line.
//!
//! ```text
//! create  ──► stock += qty            (stock_receipt)
//! update  ──► stock += new − old      (stock_receipt_edited)
//! delete  ──► stock −= qty            (stock_receipt_deleted)
//!
//! linked to a PO line? quantity_received moves by the same amount,
//!                      the purchase order status is recomputed
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use emporos_core::validation::{validate_line_quantity, validate_within_limit};
use emporos_core::{new_id, ActionKind, Actor, Product, Quantity, StockReason, StockReceipt};
use emporos_db::{ProductRepository, PurchaseOrderRepository, StockReceiptRepository};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::lifecycle::purchasing::sync_status;
use crate::stock;

impl Ledger {
    /// Quick stock entry outside any purchase order.
    pub async fn create_stock_receipt(
        &self,
        product_id: &str,
        quantity: Quantity,
        notes: Option<String>,
        actor: &Actor,
    ) -> LedgerResult<StockReceipt> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let product = ProductRepository::lock_for_update(tx.conn(), product_id).await?;
            validate_line_quantity(quantity, Some(product.unit_of_measurement))?;
            let receipt = insert_receipt(tx.conn(), &product, quantity, None, notes, actor, now).await?;
            Ok::<_, LedgerError>((product, receipt))
        }
        .await;
        let (product, receipt) = result.map_err(|e| rejected("create_stock_receipt", e))?;

        tx.commit().await?;
        info!(code = %product.code, quantity = %quantity, actor = %actor.name, "Stock received");
        Ok(receipt)
    }

    /// Changes a receipt's quantity; stock moves by the difference.
    pub async fn update_stock_receipt(
        &self,
        id: &str,
        quantity: Quantity,
        actor: &Actor,
    ) -> LedgerResult<StockReceipt> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let receipt = update_in(tx.conn(), id, quantity, actor, now)
            .await
            .map_err(|e| rejected("update_stock_receipt", e))?;

        tx.commit().await?;
        info!(id = %receipt.id, quantity = %receipt.quantity_added, actor = %actor.name, "Stock receipt updated");
        Ok(receipt)
    }

    pub async fn delete_stock_receipt(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let receipt = StockReceiptRepository::lock_for_update(tx.conn(), id).await?;
            let product = ProductRepository::lock_for_update(tx.conn(), &receipt.product_id).await?;

            stock::adjust(
                tx.conn(),
                &product.id,
                -receipt.quantity_added,
                StockReason::StockReceiptDeleted,
                Some(receipt.id.as_str()),
                now,
            )
            .await?;
            if let Some(item_id) = receipt.purchase_order_item_id.as_deref() {
                move_received(tx.conn(), item_id, -receipt.quantity_added).await?;
            }
            StockReceiptRepository::delete(tx.conn(), &receipt.id).await?;

            audit::record(
                tx.conn(),
                actor,
                ActionKind::Delete,
                Subject::new("StockReceipt", &receipt.id, &product.code),
                format!("Receipt of {} removed", receipt.quantity_added),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(product)
        }
        .await;
        let product = result.map_err(|e| rejected("delete_stock_receipt", e))?;

        tx.commit().await?;
        info!(code = %product.code, actor = %actor.name, "Stock receipt deleted");
        Ok(())
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

/// Writes a receipt and moves the stock it brings in.
pub(crate) async fn insert_receipt(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: Quantity,
    purchase_order_item_id: Option<String>,
    notes: Option<String>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<StockReceipt> {
    let receipt = StockReceipt {
        id: new_id(),
        product_id: product.id.clone(),
        quantity_added: quantity,
        date_received: now,
        purchase_order_item_id,
        notes,
        recorded_by: actor.id.clone(),
    };
    StockReceiptRepository::insert(conn, &receipt).await?;
    stock::adjust(
        conn,
        &product.id,
        quantity,
        StockReason::StockReceipt,
        Some(receipt.id.as_str()),
        now,
    )
    .await?;

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("StockReceipt", &receipt.id, &product.code),
        format!("Received {quantity} of {}", product.code),
        now,
    )
    .await?;

    Ok(receipt)
}

async fn update_in(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: Quantity,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<StockReceipt> {
    let mut receipt = StockReceiptRepository::lock_for_update(conn, id).await?;
    let product = ProductRepository::lock_for_update(conn, &receipt.product_id).await?;
    validate_line_quantity(quantity, Some(product.unit_of_measurement))?;

    let delta = quantity - receipt.quantity_added;
    if delta.is_zero() {
        return Ok(receipt);
    }

    if let Some(item_id) = receipt.purchase_order_item_id.as_deref() {
        move_received(conn, item_id, delta).await?;
    }
    stock::adjust(
        conn,
        &product.id,
        delta,
        StockReason::StockReceiptEdited,
        Some(receipt.id.as_str()),
        now,
    )
    .await?;
    StockReceiptRepository::set_quantity(conn, &receipt.id, quantity).await?;

    audit::record(
        conn,
        actor,
        ActionKind::Update,
        Subject::new("StockReceipt", &receipt.id, &product.code),
        format!("{} → {quantity}", receipt.quantity_added),
        now,
    )
    .await?;

    receipt.quantity_added = quantity;
    Ok(receipt)
}

/// Keeps a purchase order line's received quantity in step with its receipts.
async fn move_received(conn: &mut SqliteConnection, item_id: &str, delta: Quantity) -> LedgerResult<()> {
    let item = PurchaseOrderRepository::find_item(conn, item_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("PurchaseOrderItem", item_id))?;
    validate_within_limit("quantity", item.quantity_received + delta, item.quantity)?;

    PurchaseOrderRepository::add_received(conn, item_id, delta).await?;
    let order = PurchaseOrderRepository::lock_for_update(conn, &item.purchase_order_id).await?;
    sync_status(conn, &order).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::purchasing::{NewPurchaseOrder, NewPurchaseOrderLine, ReceiveLine};
    use crate::testing::{file_ledger, ledger, product_input, stock_of};
    use emporos_core::PurchaseOrderStatus;

    #[tokio::test]
    async fn test_receipt_edit_and_delete_move_stock() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 10), &actor).await.unwrap();

        let receipt = ledger
            .create_stock_receipt(&product.id, Quantity::units(5), None, &actor)
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));

        ledger.update_stock_receipt(&receipt.id, Quantity::units(2), &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(12));

        ledger.delete_stock_receipt(&receipt.id, &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(10));
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_receipt_quantity_must_be_positive() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 10), &actor).await.unwrap();

        let err = ledger
            .create_stock_receipt(&product.id, Quantity::zero(), None, &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ledger
            .create_stock_receipt(&product.id, Quantity::from_hundredths(150), None, &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_linked_receipt_keeps_purchase_order_in_step() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 0), &actor).await.unwrap();
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
                        quantity: Quantity::units(4),
                        cost_price: None,
                    }],
                },
                &actor,
            )
            .await
            .unwrap();
        let items = ledger.database().purchase_orders().get_items(&order.id).await.unwrap();
        let order = ledger
            .receive_purchase_order(
                &order.id,
                vec![ReceiveLine {
                    item_id: items[0].id.clone(),
                    quantity: Quantity::units(4),
                }],
                &actor,
            )
            .await
            .unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Completed);

        let receipts = ledger
            .database()
            .stock_receipts()
            .list_for_purchase_order_item(&items[0].id)
            .await
            .unwrap();

        let err = ledger
            .update_stock_receipt(&receipts[0].id, Quantity::units(5), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        ledger.update_stock_receipt(&receipts[0].id, Quantity::units(3), &actor).await.unwrap();
        let order = ledger.database().purchase_orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::PartiallyReceived);

        ledger.delete_stock_receipt(&receipts[0].id, &actor).await.unwrap();
        let order = ledger.database().purchase_orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Ordered);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::zero());
    }

    #[tokio::test]
    async fn test_concurrent_receipts_are_not_lost() {
        let (ledger, path) = file_ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 10), &actor).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = ledger.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .create_stock_receipt(&product_id, Quantity::units(3), None, &Actor::system())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(16));
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());

        ledger.database().close().await;
        let _ = std::fs::remove_file(path);
    }
}
