//! # Orders
//!
//! ```text
//! ┌─────────┐  processing   ┌────────────┐  completed  ┌───────────┐
//! │ PENDING │──────────────►│ PROCESSING │────────────►│ COMPLETED │
//! └────┬────┘               └─────┬──────┘             └─────┬─────┘
//!      │ completed ───────────────┼─────────────────────────►│
//!      │                          │                          │
//!      └──────────────────────────┴──────────┬───────────────┘
//!                                            ▼ cancel_order
//!                                     ┌───────────┐
//!                                     │ CANCELLED │  stock += stock_applied
//!                                     └───────────┘  per line, once
//! ```
//!
//! Each line remembers how much stock it took (`stock_applied`). Edits move
//! stock by `new − stock_applied`, cancellation and deletion give back
//! exactly `stock_applied`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use emporos_core::pricing::price_order_line;
use emporos_core::validation::{check_stock, validate_line_quantity, validate_percent, validate_price};
use emporos_core::{
    new_id, ActionKind, Actor, InvoiceStatus, Lifecycle, Money, Order, OrderItem, OrderStatus,
    Percent, Product, Quantity, ShippingDetails, StockReason, ValidationError,
};
use emporos_db::{
    CustomerRepository, DeliveryNoteRepository, InvoiceRepository, OrderRepository,
    ProductRepository,
};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::numbering::insert_numbered;
use crate::stock;

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: Option<String>,
    /// Defaults to the product name.
    pub description: Option<String>,
    pub quantity: Quantity,
    /// Zero or absent takes the product's price and VAT.
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub discount: Percent,
    #[serde(default)]
    pub vat: Percent,
    #[serde(default)]
    pub is_gift: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: Option<String>,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub shipping: ShippingDetails,
    pub comments: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// One edit to the lines of an existing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OrderLineChange {
    Add(NewOrderLine),
    SetQuantity { item_id: String, quantity: Quantity },
    Remove { item_id: String },
}

// =============================================================================
// Operations
// =============================================================================

impl Ledger {
    /// Creates a pending order and takes its stock.
    pub async fn create_order(&self, input: NewOrder, actor: &Actor) -> LedgerResult<Order> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let order = create_order_in(tx.conn(), input, attempts, actor, now)
            .await
            .map_err(|e| rejected("create_order", e))?;

        tx.commit().await?;
        info!(number = %order.order_number, total = %order.total_amount, actor = %actor.name, "Order created");
        Ok(order)
    }

    /// Applies line edits to an order that is not invoiced, shipped or cancelled.
    pub async fn update_order_lines(
        &self,
        order_id: &str,
        changes: Vec<OrderLineChange>,
        actor: &Actor,
    ) -> LedgerResult<Order> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let order = update_lines_in(tx.conn(), order_id, changes, actor, now)
            .await
            .map_err(|e| rejected("update_order_lines", e))?;

        tx.commit().await?;
        info!(number = %order.order_number, total = %order.total_amount, actor = %actor.name, "Order lines updated");
        Ok(order)
    }

    /// Moves an order forward. `Cancelled` goes through [`Ledger::cancel_order`].
    pub async fn set_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        actor: &Actor,
    ) -> LedgerResult<Order> {
        if status == OrderStatus::Cancelled {
            return self.cancel_order(order_id, actor).await;
        }

        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let order = set_status_in(tx.conn(), order_id, status, actor, now)
            .await
            .map_err(|e| rejected("set_order_status", e))?;

        tx.commit().await?;
        info!(number = %order.order_number, status = %order.status, actor = %actor.name, "Order status changed");
        Ok(order)
    }

    pub async fn complete_order(&self, order_id: &str, actor: &Actor) -> LedgerResult<Order> {
        self.set_order_status(order_id, OrderStatus::Completed, actor).await
    }

    /// Cancels an order and gives back its stock.
    pub async fn cancel_order(&self, order_id: &str, actor: &Actor) -> LedgerResult<Order> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let order = OrderRepository::lock_for_update(tx.conn(), order_id).await?;
            ensure_not_invoiced(tx.conn(), &order).await?;
            cancel_order_in(tx.conn(), order, actor, now).await
        }
        .await;
        let order = result.map_err(|e| rejected("cancel_order", e))?;

        tx.commit().await?;
        info!(number = %order.order_number, actor = %actor.name, "Order cancelled");
        Ok(order)
    }

    /// Deletes an order with no invoice. Stock comes back unless it already did.
    pub async fn delete_order(&self, order_id: &str, actor: &Actor) -> LedgerResult<()> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let number = delete_order_in(tx.conn(), order_id, actor, now)
            .await
            .map_err(|e| rejected("delete_order", e))?;

        tx.commit().await?;
        info!(number = %number, actor = %actor.name, "Order deleted");
        Ok(())
    }

    /// New pending order dated today with the same customer, shipping and lines.
    pub async fn copy_order(&self, order_id: &str, actor: &Actor) -> LedgerResult<Order> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let result = async {
            let source = OrderRepository::lock_for_update(tx.conn(), order_id).await?;
            let items = OrderRepository::items(tx.conn(), order_id).await?;

            let input = NewOrder {
                customer_id: source.customer_id.clone(),
                order_date: now.date_naive(),
                delivery_date: None,
                shipping: source.shipping.clone(),
                comments: source.comments.clone(),
                lines: items
                    .into_iter()
                    .map(|item| NewOrderLine {
                        product_id: item.product_id,
                        description: Some(item.description),
                        quantity: item.quantity,
                        unit_price: Some(item.unit_price),
                        discount: item.discount_percentage,
                        vat: item.vat_percentage,
                        is_gift: item.is_gift,
                        comments: item.comments,
                    })
                    .collect(),
            };
            let copy = create_order_in(tx.conn(), input, attempts, actor, now).await?;
            Ok::<_, LedgerError>((source, copy))
        }
        .await;
        let (source, copy) = result.map_err(|e| rejected("copy_order", e))?;

        tx.commit().await?;
        info!(source = %source.order_number, number = %copy.order_number, actor = %actor.name, "Order copied");
        Ok(copy)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

pub(crate) async fn create_order_in(
    conn: &mut SqliteConnection,
    input: NewOrder,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Order> {
    if input.lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }
    if let Some(customer_id) = input.customer_id.as_deref() {
        CustomerRepository::find(conn, customer_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Customer", customer_id))?;
    }

    // Validate every line before anything is written.
    let mut products: HashMap<String, Product> = HashMap::new();
    let mut requested: HashMap<String, Quantity> = HashMap::new();
    for (index, line) in input.lines.iter().enumerate() {
        let product = match line.product_id.as_deref() {
            Some(id) => Some(load_product(conn, &mut products, id).await?),
            None => None,
        };
        validate_line(line, product.as_ref()).map_err(|e| e.at_line(index + 1))?;

        if let Some(product) = product {
            let total = requested.entry(product.id.clone()).or_default();
            *total += line.quantity;
            check_stock(&product.code, product.stock_quantity, *total).map_err(|e| e.at_line(index + 1))?;
        }
    }

    let mut order = Order {
        id: new_id(),
        order_number: String::new(),
        customer_id: input.customer_id,
        order_date: input.order_date,
        delivery_date: input.delivery_date,
        status: OrderStatus::Pending,
        shipping: input.shipping,
        total_amount: Money::zero(),
        comments: input.comments,
        created_at: now,
        updated_at: now,
    };
    insert_numbered(conn, &mut order, attempts).await?;

    let mut total = Money::zero();
    for line in &input.lines {
        let product = line.product_id.as_deref().and_then(|id| products.get(id));
        let item = take_line(conn, &order, line, product, now).await?;
        total += item.total_price;
    }

    OrderRepository::set_total(conn, &order.id, total, now).await?;
    order.total_amount = total;

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("Order", &order.id, &order.order_number),
        format!("{} lines, total {}", input.lines.len(), total),
        now,
    )
    .await?;

    Ok(order)
}

async fn update_lines_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    changes: Vec<OrderLineChange>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Order> {
    let mut order = OrderRepository::lock_for_update(conn, order_id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(LedgerError::precondition("Order", &order.order_number, "order is cancelled"));
    }
    ensure_not_invoiced(conn, &order).await?;
    if let Some(note) = DeliveryNoteRepository::latest_active_for_order(conn, &order.id).await? {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("delivery note {} is active", note.delivery_note_number),
        ));
    }

    let mut items = OrderRepository::items(conn, &order.id).await?;
    let mut products: HashMap<String, Product> = HashMap::new();

    for (index, change) in changes.into_iter().enumerate() {
        let line_no = index + 1;
        match change {
            OrderLineChange::Add(line) => {
                let product = match line.product_id.as_deref() {
                    Some(id) => Some(load_product(conn, &mut products, id).await?),
                    None => None,
                };
                validate_line(&line, product.as_ref()).map_err(|e| e.at_line(line_no))?;
                if let Some(product) = &product {
                    let current = ProductRepository::lock_for_update(conn, &product.id).await?;
                    check_stock(&current.code, current.stock_quantity, line.quantity)
                        .map_err(|e| e.at_line(line_no))?;
                }
                let item = take_line(conn, &order, &line, product.as_ref(), now).await?;
                items.push(item);
            }
            OrderLineChange::SetQuantity { item_id, quantity } => {
                let position = item_position(&items, &item_id)?;
                let item = &mut items[position];

                let product = match item.product_id.as_deref() {
                    Some(id) => Some(ProductRepository::lock_for_update(conn, id).await?),
                    None => None,
                };
                validate_line_quantity(quantity, product.as_ref().map(|p| p.unit_of_measurement))
                    .map_err(|e| e.at_line(line_no))?;

                if let Some(product) = &product {
                    let available = product.stock_quantity + item.stock_applied;
                    check_stock(&product.code, available, quantity).map_err(|e| e.at_line(line_no))?;
                    stock::adjust(
                        conn,
                        &product.id,
                        item.stock_applied - quantity,
                        StockReason::OrderLine,
                        Some(order.order_number.as_str()),
                        now,
                    )
                    .await?;
                    item.stock_applied = quantity;
                }

                let price = price_order_line(
                    quantity,
                    Some(item.unit_price),
                    item.discount_percentage,
                    item.vat_percentage,
                    item.is_gift,
                    None,
                );
                item.quantity = quantity;
                item.total_price = price.total;
                OrderRepository::update_item(conn, item).await?;
            }
            OrderLineChange::Remove { item_id } => {
                let position = item_position(&items, &item_id)?;
                let item = items.remove(position);
                if let Some(product_id) = item.product_id.as_deref() {
                    stock::adjust(
                        conn,
                        product_id,
                        item.stock_applied,
                        StockReason::OrderLine,
                        Some(order.order_number.as_str()),
                        now,
                    )
                    .await?;
                }
                OrderRepository::delete_item(conn, &item.id).await?;
            }
        }
    }

    let total: Money = items.iter().map(|item| item.total_price).sum();
    OrderRepository::set_total(conn, &order.id, total, now).await?;
    order.total_amount = total;
    order.updated_at = now;

    audit::record(
        conn,
        actor,
        ActionKind::Update,
        Subject::new("Order", &order.id, &order.order_number),
        format!("Lines edited, total {total}"),
        now,
    )
    .await?;

    Ok(order)
}

async fn set_status_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: OrderStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Order> {
    let mut order = OrderRepository::lock_for_update(conn, order_id).await?;
    let from = order.status;
    order.status = order.status.transition_to(status)?;
    ensure_not_invoiced(conn, &order).await?;

    OrderRepository::set_status(conn, &order.id, order.status, now).await?;
    order.updated_at = now;

    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("Order", &order.id, &order.order_number),
        format!("{from} → {}", order.status),
        now,
    )
    .await?;

    Ok(order)
}

/// Cancels `order` and returns every line's applied stock.
///
/// No invoice guard: cascades from delivery notes and invoices call this
/// after their own checks.
pub(crate) async fn cancel_order_in(
    conn: &mut SqliteConnection,
    mut order: Order,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Order> {
    let from = order.status;
    order.status = order.status.transition_to(OrderStatus::Cancelled)?;

    release_stock(conn, &order, StockReason::OrderCancelled, now).await?;
    OrderRepository::set_status(conn, &order.id, order.status, now).await?;
    order.updated_at = now;

    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("Order", &order.id, &order.order_number),
        format!("{from} → {}", order.status),
        now,
    )
    .await?;

    Ok(order)
}

async fn delete_order_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<String> {
    let order = OrderRepository::lock_for_update(conn, order_id).await?;
    if let Some(invoice) = InvoiceRepository::find_by_order(conn, &order.id).await? {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("referenced by invoice {}", invoice.invoice_number),
        ));
    }

    if order.status != OrderStatus::Cancelled {
        release_stock(conn, &order, StockReason::OrderDeleted, now).await?;
    }
    OrderRepository::delete(conn, &order.id).await?;

    audit::record(
        conn,
        actor,
        ActionKind::Delete,
        Subject::new("Order", &order.id, &order.order_number),
        format!("Deleted while {}", order.status),
        now,
    )
    .await?;

    Ok(order.order_number)
}

// =============================================================================
// Helpers
// =============================================================================

/// Rejects when a non-cancelled invoice references the order.
pub(crate) async fn ensure_not_invoiced(conn: &mut SqliteConnection, order: &Order) -> LedgerResult<()> {
    match InvoiceRepository::find_by_order(conn, &order.id).await? {
        Some(invoice) if invoice.status != InvoiceStatus::Cancelled => Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("invoiced as {}", invoice.invoice_number),
        )),
        _ => Ok(()),
    }
}

/// Gives back `stock_applied` of every line and zeroes it.
async fn release_stock(
    conn: &mut SqliteConnection,
    order: &Order,
    reason: StockReason,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    for mut item in OrderRepository::items(conn, &order.id).await? {
        let Some(product_id) = item.product_id.clone() else {
            continue;
        };
        if item.stock_applied.is_zero() {
            continue;
        }

        stock::adjust(conn, &product_id, item.stock_applied, reason, Some(order.order_number.as_str()), now)
            .await?;
        debug!(item = %item.id, released = %item.stock_applied, "Order line stock released");

        item.stock_applied = Quantity::zero();
        OrderRepository::update_item(conn, &item).await?;
    }
    Ok(())
}

/// Prices, stores and takes stock for one new line.
async fn take_line(
    conn: &mut SqliteConnection,
    order: &Order,
    line: &NewOrderLine,
    product: Option<&Product>,
    now: DateTime<Utc>,
) -> LedgerResult<OrderItem> {
    let price = price_order_line(
        line.quantity,
        line.unit_price,
        line.discount,
        line.vat,
        line.is_gift,
        product.map(|p| (p.price, p.vat_percentage)),
    );

    let mut item = OrderItem {
        id: new_id(),
        order_id: order.id.clone(),
        product_id: product.map(|p| p.id.clone()),
        description: line
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| product.map(|p| p.name.clone()))
            .unwrap_or_default(),
        quantity: line.quantity,
        is_gift: line.is_gift,
        unit_price: price.unit_price,
        discount_percentage: price.discount,
        vat_percentage: price.vat,
        total_price: price.total,
        stock_applied: Quantity::zero(),
        comments: line.comments.clone(),
    };

    if let Some(product) = product {
        stock::adjust(
            conn,
            &product.id,
            -line.quantity,
            StockReason::OrderLine,
            Some(order.order_number.as_str()),
            now,
        )
        .await?;
        item.stock_applied = line.quantity;
    }

    OrderRepository::insert_item(conn, &item).await?;
    Ok(item)
}

fn validate_line(line: &NewOrderLine, product: Option<&Product>) -> Result<(), ValidationError> {
    validate_line_quantity(line.quantity, product.map(|p| p.unit_of_measurement))?;
    validate_percent("discount", line.discount)?;
    validate_percent("vat", line.vat)?;
    if let Some(price) = line.unit_price {
        validate_price("unit_price", price)?;
    }

    let has_description = line.description.as_deref().map_or(false, |d| !d.trim().is_empty());
    if product.is_none() && !has_description {
        return Err(ValidationError::required("description"));
    }
    Ok(())
}

async fn load_product(
    conn: &mut SqliteConnection,
    cache: &mut HashMap<String, Product>,
    id: &str,
) -> LedgerResult<Product> {
    if let Some(product) = cache.get(id) {
        return Ok(product.clone());
    }
    let product = ProductRepository::lock_for_update(conn, id).await?;
    cache.insert(id.to_string(), product.clone());
    Ok(product)
}

fn item_position(items: &[OrderItem], item_id: &str) -> LedgerResult<usize> {
    items
        .iter()
        .position(|item| item.id == item_id)
        .ok_or_else(|| LedgerError::not_found("OrderItem", item_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{file_ledger, ledger, order_input, product_input, stock_of};
    use chrono::Datelike;
    use emporos_core::{CoreError, DocumentKind};

    #[tokio::test]
    async fn test_order_takes_stock_and_cancel_returns_it() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();

        let order = ledger
            .create_order(order_input(None, &[(&product.id, 5)]), &actor)
            .await
            .unwrap();
        assert_eq!(order.total_amount, Money::from_cents(62_000));
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));

        let cancelled = ledger.cancel_order(&order.id, &actor).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_second_cancel_is_rejected_without_effect() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();
        let order = ledger
            .create_order(order_input(None, &[(&product.id, 5)]), &actor)
            .await
            .unwrap();

        ledger.cancel_order(&order.id, &actor).await.unwrap();
        let err = ledger.cancel_order(&order.id, &actor).await.unwrap_err();

        assert!(matches!(err, LedgerError::Core(CoreError::InvalidTransition { .. })));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));
    }

    #[tokio::test]
    async fn test_concurrent_orders_get_distinct_numbers() {
        let (ledger, path) = file_ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let input = order_input(None, &[(&product.id, 1)]);
            handles.push(tokio::spawn(async move {
                ledger.create_order(input, &Actor::system()).await
            }));
        }
        let mut sequences = Vec::new();
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            let year = order.order_date.year();
            sequences.push(DocumentKind::Order.parse_sequence(year, &order.order_number).unwrap());
        }
        sequences.sort_unstable();

        assert_eq!(sequences, (1..=8).collect::<Vec<u32>>());
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(12));
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());

        ledger.database().close().await;
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_whole_order() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 4), &actor).await.unwrap();

        let err = ledger
            .create_order(order_input(None, &[(&product.id, 3), (&product.id, 2)]), &actor)
            .await
            .unwrap_err();

        match &err {
            LedgerError::Core(CoreError::Line { line, source }) => {
                assert_eq!(*line, 2);
                assert!(matches!(**source, CoreError::InsufficientStock { .. }));
            }
            other => panic!("expected a line-tagged stock error, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(4));
        assert!(ledger.database().orders().list(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fractional_pieces_rejected_with_line_number() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();

        let mut input = order_input(None, &[(&product.id, 1)]);
        input.lines.push(NewOrderLine {
            product_id: Some(product.id.clone()),
            quantity: Quantity::from_hundredths(150),
            ..NewOrderLine::default()
        });
        let err = ledger.create_order(input, &actor).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::Line { line: 2, .. }))
        ));
    }

    #[tokio::test]
    async fn test_line_edits_move_stock_by_difference() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let a = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();
        let b = ledger.create_product(product_input("SKU2", 10), &actor).await.unwrap();
        let order = ledger
            .create_order(order_input(None, &[(&a.id, 5)]), &actor)
            .await
            .unwrap();
        let items = ledger.database().orders().get_items(&order.id).await.unwrap();

        let order = ledger
            .update_order_lines(
                &order.id,
                vec![
                    OrderLineChange::SetQuantity {
                        item_id: items[0].id.clone(),
                        quantity: Quantity::units(8),
                    },
                    OrderLineChange::Add(NewOrderLine {
                        product_id: Some(b.id.clone()),
                        quantity: Quantity::units(2),
                        ..NewOrderLine::default()
                    }),
                ],
                &actor,
            )
            .await
            .unwrap();

        assert_eq!(stock_of(&ledger, &a.id).await, Quantity::units(12));
        assert_eq!(stock_of(&ledger, &b.id).await, Quantity::units(8));
        // 10 × 124.00
        assert_eq!(order.total_amount, Money::from_cents(124_000));

        let items = ledger.database().orders().get_items(&order.id).await.unwrap();
        let first = items.iter().find(|i| i.product_id.as_deref() == Some(a.id.as_str())).unwrap();
        ledger
            .update_order_lines(&order.id, vec![OrderLineChange::Remove { item_id: first.id.clone() }], &actor)
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &a.id).await, Quantity::units(20));

        ledger.cancel_order(&order.id, &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &b.id).await, Quantity::units(10));
        assert!(ledger.stock_conservation(&a.id).await.unwrap().holds());
        assert!(ledger.stock_conservation(&b.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_status_moves_forward_only() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();
        let order = ledger
            .create_order(order_input(None, &[(&product.id, 1)]), &actor)
            .await
            .unwrap();

        ledger.set_order_status(&order.id, OrderStatus::Processing, &actor).await.unwrap();
        let completed = ledger.complete_order(&order.id, &actor).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);

        let err = ledger
            .set_order_status(&order.id, OrderStatus::Pending, &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_and_copy() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();
        let order = ledger
            .create_order(order_input(None, &[(&product.id, 5)]), &actor)
            .await
            .unwrap();

        let copy = ledger.copy_order(&order.id, &actor).await.unwrap();
        assert_ne!(copy.order_number, order.order_number);
        assert_eq!(copy.total_amount, order.total_amount);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(10));

        ledger.delete_order(&order.id, &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));
        assert!(ledger.database().orders().get_by_id(&order.id).await.unwrap().is_none());
    }
}
