//! # Delivery Notes
//!
//! ```text
//! ┌───────────┐ shipped ┌─────────┐ delivered ┌───────────┐
//! │ PREPARING │────────►│ SHIPPED │──────────►│ DELIVERED │
//! └─────┬─────┘         └────┬────┘           └───────────┘
//!       └──────────┬─────────┘
//!                  ▼ cancel_delivery_note
//!            ┌───────────┐
//!            │ CANCELLED │ ──► linked order cancelled (stock back once,
//!            └───────────┘     through the order cancellation path)
//! ```
//!
//! Delivery notes never move stock themselves; the order already did.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use emporos_core::validation::validate_line_quantity;
use emporos_core::{
    new_id, ActionKind, Actor, Customer, DeliveryNote, DeliveryNoteItem, DeliveryNoteStatus,
    InvoiceStatus, Lifecycle, OrderStatus, Quantity, ShippingDetails, ValidationError,
};
use emporos_db::{
    CustomerRepository, DeliveryNoteRepository, InvoiceRepository, OrderRepository,
    ProductRepository,
};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::lifecycle::orders::{cancel_order_in, ensure_not_invoiced};
use crate::lifecycle::reference::{insert_customer, NewCustomer};
use crate::numbering::insert_numbered;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDeliveryNoteLine {
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryNote {
    /// Falls back to the generic delivery customer.
    pub customer_id: Option<String>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    pub lines: Vec<NewDeliveryNoteLine>,
}

impl Ledger {
    /// Delivery note for a completed order with no active note.
    pub async fn create_delivery_note_from_order(
        &self,
        order_id: &str,
        actor: &Actor,
    ) -> LedgerResult<DeliveryNote> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let note = from_order_in(tx.conn(), order_id, self, actor, now)
            .await
            .map_err(|e| rejected("create_delivery_note_from_order", e))?;

        tx.commit().await?;
        info!(number = %note.delivery_note_number, actor = %actor.name, "Delivery note created from order");
        Ok(note)
    }

    pub async fn create_standalone_delivery_note(
        &self,
        input: NewDeliveryNote,
        actor: &Actor,
    ) -> LedgerResult<DeliveryNote> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let note = standalone_in(tx.conn(), input, self, actor, now)
            .await
            .map_err(|e| rejected("create_standalone_delivery_note", e))?;

        tx.commit().await?;
        info!(number = %note.delivery_note_number, actor = %actor.name, "Delivery note created");
        Ok(note)
    }

    /// `preparing → shipped → delivered`. `Cancelled` goes through
    /// [`Ledger::cancel_delivery_note`].
    pub async fn set_delivery_note_status(
        &self,
        id: &str,
        status: DeliveryNoteStatus,
        actor: &Actor,
    ) -> LedgerResult<DeliveryNote> {
        if status == DeliveryNoteStatus::Cancelled {
            return self.cancel_delivery_note(id, actor).await;
        }

        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let mut note = DeliveryNoteRepository::lock_for_update(tx.conn(), id).await?;
            let from = note.status;
            note.status = note.status.transition_to(status)?;
            DeliveryNoteRepository::set_status(tx.conn(), &note.id, note.status).await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::StatusChange,
                Subject::new("DeliveryNote", &note.id, &note.delivery_note_number),
                format!("{from} → {}", note.status),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(note)
        }
        .await;
        let note = result.map_err(|e| rejected("set_delivery_note_status", e))?;

        tx.commit().await?;
        info!(number = %note.delivery_note_number, status = %note.status, actor = %actor.name, "Delivery note status changed");
        Ok(note)
    }

    /// Cancels a note that is not invoiced, and its order with it.
    pub async fn cancel_delivery_note(&self, id: &str, actor: &Actor) -> LedgerResult<DeliveryNote> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let note = cancel_in(tx.conn(), id, actor, now)
            .await
            .map_err(|e| rejected("cancel_delivery_note", e))?;

        tx.commit().await?;
        info!(number = %note.delivery_note_number, actor = %actor.name, "Delivery note cancelled");
        Ok(note)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

async fn from_order_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    ledger: &Ledger,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<DeliveryNote> {
    let order = OrderRepository::lock_for_update(conn, order_id).await?;
    if order.status != OrderStatus::Completed {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("order is {}, not completed", order.status),
        ));
    }
    if let Some(active) = DeliveryNoteRepository::latest_active_for_order(conn, &order.id).await? {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("delivery note {} is already active", active.delivery_note_number),
        ));
    }

    let customer = match order.customer_id.as_deref() {
        Some(id) => CustomerRepository::lock_for_update(conn, id).await?,
        None => generic_customer(conn, ledger, actor, now).await?,
    };

    let mut shipping = order.shipping.clone();
    if shipping.shipping_vat_number.is_none() {
        shipping.shipping_vat_number = customer.vat_number.clone();
    }

    let mut note = DeliveryNote {
        id: new_id(),
        delivery_note_number: String::new(),
        order_id: Some(order.id.clone()),
        customer_id: customer.id.clone(),
        issue_date: now.date_naive(),
        status: DeliveryNoteStatus::Preparing,
        shipping,
        notes: Some(format!("Based on order {}", order.order_number)),
        created_at: now,
    };
    insert_numbered(conn, &mut note, ledger.numbering_retries()).await?;

    for item in OrderRepository::items(conn, &order.id).await? {
        let line = DeliveryNoteItem {
            id: new_id(),
            delivery_note_id: note.id.clone(),
            product_id: item.product_id,
            description: item.description,
            quantity: item.quantity,
        };
        DeliveryNoteRepository::insert_item(conn, &line).await?;
    }

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("DeliveryNote", &note.id, &note.delivery_note_number),
        format!("From order {}", order.order_number),
        now,
    )
    .await?;

    Ok(note)
}

async fn standalone_in(
    conn: &mut SqliteConnection,
    input: NewDeliveryNote,
    ledger: &Ledger,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<DeliveryNote> {
    if input.lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let mut lines = Vec::with_capacity(input.lines.len());
    for (index, line) in input.lines.into_iter().enumerate() {
        let product = match line.product_id.as_deref() {
            Some(id) => Some(ProductRepository::lock_for_update(conn, id).await?),
            None => None,
        };
        validate_line_quantity(line.quantity, product.as_ref().map(|p| p.unit_of_measurement))
            .map_err(|e| e.at_line(index + 1))?;

        let description = line
            .description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| product.as_ref().map(|p| p.name.clone()))
            .ok_or_else(|| ValidationError::required("description").at_line(index + 1))?;
        lines.push((line.product_id, description, line.quantity));
    }

    let customer = match input.customer_id.as_deref() {
        Some(id) => CustomerRepository::lock_for_update(conn, id).await?,
        None => generic_customer(conn, ledger, actor, now).await?,
    };

    let mut note = DeliveryNote {
        id: new_id(),
        delivery_note_number: String::new(),
        order_id: None,
        customer_id: customer.id,
        issue_date: input.issue_date,
        status: DeliveryNoteStatus::Preparing,
        shipping: input.shipping,
        notes: input.notes,
        created_at: now,
    };
    insert_numbered(conn, &mut note, ledger.numbering_retries()).await?;

    for (product_id, description, quantity) in lines {
        let line = DeliveryNoteItem {
            id: new_id(),
            delivery_note_id: note.id.clone(),
            product_id,
            description,
            quantity,
        };
        DeliveryNoteRepository::insert_item(conn, &line).await?;
    }

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("DeliveryNote", &note.id, &note.delivery_note_number),
        "Stand-alone",
        now,
    )
    .await?;

    Ok(note)
}

async fn cancel_in(
    conn: &mut SqliteConnection,
    id: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<DeliveryNote> {
    let mut note = DeliveryNoteRepository::lock_for_update(conn, id).await?;
    let from = note.status;
    note.status = note.status.transition_to(DeliveryNoteStatus::Cancelled)?;

    if let Some(invoice) = InvoiceRepository::find_by_delivery_note(conn, &note.id).await? {
        if invoice.status != InvoiceStatus::Cancelled {
            return Err(LedgerError::precondition(
                "DeliveryNote",
                &note.delivery_note_number,
                format!("invoiced as {}", invoice.invoice_number),
            ));
        }
    }
    if let Some(order_id) = note.order_id.as_deref() {
        let order = OrderRepository::lock_for_update(conn, order_id).await?;
        ensure_not_invoiced(conn, &order).await?;
    }

    DeliveryNoteRepository::set_status(conn, &note.id, note.status).await?;
    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("DeliveryNote", &note.id, &note.delivery_note_number),
        format!("{from} → {}", note.status),
        now,
    )
    .await?;

    cancel_linked_order(conn, &note, actor, now).await?;
    Ok(note)
}

/// Invoice cancellation cascade: the note is cancelled whatever its status.
pub(crate) async fn force_cancel_in(
    conn: &mut SqliteConnection,
    mut note: DeliveryNote,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<DeliveryNote> {
    if note.status != DeliveryNoteStatus::Cancelled {
        let from = note.status;
        note.status = DeliveryNoteStatus::Cancelled;
        DeliveryNoteRepository::set_status(conn, &note.id, note.status).await?;
        audit::record(
            conn,
            actor,
            ActionKind::StatusChange,
            Subject::new("DeliveryNote", &note.id, &note.delivery_note_number),
            format!("{from} → {} (invoice cancelled)", note.status),
            now,
        )
        .await?;
    }

    cancel_linked_order(conn, &note, actor, now).await?;
    Ok(note)
}

async fn cancel_linked_order(
    conn: &mut SqliteConnection,
    note: &DeliveryNote,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let Some(order_id) = note.order_id.as_deref() else {
        return Ok(());
    };
    let order = OrderRepository::lock_for_update(conn, order_id).await?;
    if order.status != OrderStatus::Cancelled {
        cancel_order_in(conn, order, actor, now).await?;
    }
    Ok(())
}

/// The customer stand-alone notes fall back to, created on first use.
async fn generic_customer(
    conn: &mut SqliteConnection,
    ledger: &Ledger,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Customer> {
    let code = &ledger.config().generic_dn_customer_code;
    if let Some(customer) = CustomerRepository::find_by_code(conn, code).await? {
        return Ok(customer);
    }

    let input = NewCustomer {
        code: Some(code.clone()),
        first_name: "Generic".to_string(),
        last_name: "Delivery".to_string(),
        can_be_invoiced: false,
        ..NewCustomer::default()
    };
    insert_customer(conn, input, ledger.numbering_retries(), actor, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{completed_order, ledger, product_input, stock_of};

    #[tokio::test]
    async fn test_from_order_copies_lines_and_shipping() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, _product) = completed_order(&ledger, 5).await;

        let note = ledger.create_delivery_note_from_order(&order.id, &actor).await.unwrap();
        assert_eq!(note.status, DeliveryNoteStatus::Preparing);
        assert_eq!(note.notes.as_deref(), Some(format!("Based on order {}", order.order_number).as_str()));
        assert_eq!(note.shipping.shipping_vat_number.as_deref(), Some("EL123456789"));

        let items = ledger.database().delivery_notes().get_items(&note.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, Quantity::units(5));

        let err = ledger.create_delivery_note_from_order(&order.id, &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_order_once() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, product) = completed_order(&ledger, 5).await;
        let note = ledger.create_delivery_note_from_order(&order.id, &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));

        ledger.cancel_delivery_note(&note.id, &actor).await.unwrap();

        let order = ledger.database().orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));

        let err = ledger.cancel_delivery_note(&note.id, &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));
    }

    #[tokio::test]
    async fn test_delivered_note_cannot_be_cancelled() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, _product) = completed_order(&ledger, 1).await;
        let note = ledger.create_delivery_note_from_order(&order.id, &actor).await.unwrap();

        ledger.set_delivery_note_status(&note.id, DeliveryNoteStatus::Shipped, &actor).await.unwrap();
        ledger.set_delivery_note_status(&note.id, DeliveryNoteStatus::Delivered, &actor).await.unwrap();

        let err = ledger.cancel_delivery_note(&note.id, &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_standalone_uses_generic_customer() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 20), &actor).await.unwrap();

        let input = NewDeliveryNote {
            customer_id: None,
            issue_date: Utc::now().date_naive(),
            shipping: ShippingDetails::default(),
            notes: None,
            lines: vec![NewDeliveryNoteLine {
                product_id: Some(product.id.clone()),
                description: None,
                quantity: Quantity::units(2),
            }],
        };
        let first = ledger.create_standalone_delivery_note(input.clone(), &actor).await.unwrap();
        let second = ledger.create_standalone_delivery_note(input, &actor).await.unwrap();

        assert_eq!(first.customer_id, second.customer_id);
        let generic = ledger.database().customers().get_by_id(&first.customer_id).await.unwrap().unwrap();
        assert_eq!(generic.code, "DN-GENERIC");
        assert!(!generic.can_be_invoiced);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));
    }
}
