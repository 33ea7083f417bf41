//! # Invoices
//!
//! ```text
//! ┌───────┐ issue  ┌────────┐ allocation / mark paid ┌──────┐
//! │ DRAFT │───────►│ ISSUED │───────────────────────►│ PAID │──► commission
//! └───────┘  +bal  └───┬─┬──┘                        └──┬───┘
//!                      │ │ cancel (same day)            │
//!                      │ └──────────► CANCELLED  −bal   │
//!                      │              └─► delivery note / order cancelled
//!                      │ credit note                    │
//!                      └──────────► CREDITED ◄──────────┘
//! ```
//!
//! Branch customers are never billed directly: the invoice goes to the
//! headquarters (`parent_id`), and so does the balance posting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use emporos_core::pricing::{invoice_line, invoice_totals, LineAmounts};
use emporos_core::validation::validate_percent;
use emporos_core::{
    new_id, ActionKind, Actor, Customer, Invoice, InvoiceItem, InvoiceStatus, Lifecycle, Money,
    OrderStatus, Payment, PaymentMethod, PaymentStatus, Percent, PostingKind, ShippingDetails,
    ValidationError,
};
use emporos_db::{
    CustomerRepository, DeliveryNoteRepository, InvoiceRepository, OrderRepository,
    PaymentRepository, ProductRepository,
};

use crate::allocation;
use crate::audit::{self, Subject};
use crate::balance;
use crate::commission;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::lifecycle::delivery_notes::force_cancel_in;
use crate::lifecycle::orders::cancel_order_in;
use crate::numbering::insert_numbered;

/// Options shared by both invoice sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceOptions {
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Document-level discount.
    #[serde(default)]
    pub discount: Percent,
    /// Keep the invoice as a draft; nothing is posted until it is issued.
    #[serde(default)]
    pub as_draft: bool,
    pub notes: Option<String>,
}

impl Ledger {
    pub async fn create_invoice_from_order(
        &self,
        order_id: &str,
        options: InvoiceOptions,
        actor: &Actor,
    ) -> LedgerResult<Invoice> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let invoice = from_order_in(tx.conn(), order_id, options, attempts, actor, now)
            .await
            .map_err(|e| rejected("create_invoice_from_order", e))?;

        tx.commit().await?;
        info!(
            number = %invoice.invoice_number,
            status = %invoice.status,
            total = %invoice.total_amount,
            actor = %actor.name,
            "Invoice created from order"
        );
        Ok(invoice)
    }

    pub async fn create_invoice_from_delivery_note(
        &self,
        delivery_note_id: &str,
        options: InvoiceOptions,
        actor: &Actor,
    ) -> LedgerResult<Invoice> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let invoice = from_delivery_note_in(tx.conn(), delivery_note_id, options, attempts, actor, now)
            .await
            .map_err(|e| rejected("create_invoice_from_delivery_note", e))?;

        tx.commit().await?;
        info!(
            number = %invoice.invoice_number,
            status = %invoice.status,
            total = %invoice.total_amount,
            actor = %actor.name,
            "Invoice created from delivery note"
        );
        Ok(invoice)
    }

    /// `draft → issued`; posts the total to the billed customer.
    pub async fn issue_invoice(&self, id: &str, actor: &Actor) -> LedgerResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let mut invoice = InvoiceRepository::lock_for_update(tx.conn(), id).await?;
            invoice.status = invoice.status.transition_to(InvoiceStatus::Issued)?;

            balance::post(
                tx.conn(),
                &invoice.customer_id,
                PostingKind::InvoiceIssued,
                invoice.total_amount,
                &invoice.invoice_number,
                now,
            )
            .await?;
            InvoiceRepository::set_status(tx.conn(), &invoice.id, invoice.status, now).await?;
            audit::record(
                tx.conn(),
                actor,
                ActionKind::StatusChange,
                Subject::new("Invoice", &invoice.id, &invoice.invoice_number),
                "draft → issued",
                now,
            )
            .await?;
            Ok::<_, LedgerError>(invoice)
        }
        .await;
        let invoice = result.map_err(|e| rejected("issue_invoice", e))?;

        tx.commit().await?;
        info!(number = %invoice.invoice_number, total = %invoice.total_amount, actor = %actor.name, "Invoice issued");
        Ok(invoice)
    }

    /// Settles an issued invoice with an automatic payment of its outstanding amount.
    pub async fn mark_invoice_paid(&self, id: &str, actor: &Actor) -> LedgerResult<Invoice> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let invoice = mark_paid_in(tx.conn(), id, attempts, actor, now)
            .await
            .map_err(|e| rejected("mark_invoice_paid", e))?;

        tx.commit().await?;
        info!(number = %invoice.invoice_number, paid = %invoice.paid_amount, actor = %actor.name, "Invoice marked paid");
        Ok(invoice)
    }

    /// Cancels an invoice issued on `today`.
    pub async fn cancel_invoice(&self, id: &str, today: NaiveDate, actor: &Actor) -> LedgerResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let invoice = cancel_in(tx.conn(), id, today, actor, now)
            .await
            .map_err(|e| rejected("cancel_invoice", e))?;

        tx.commit().await?;
        info!(number = %invoice.invoice_number, total = %invoice.total_amount, actor = %actor.name, "Invoice cancelled");
        Ok(invoice)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

async fn from_order_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    options: InvoiceOptions,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Invoice> {
    let order = OrderRepository::lock_for_update(conn, order_id).await?;
    if order.status != OrderStatus::Completed {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("order is {}, not completed", order.status),
        ));
    }
    if let Some(existing) = InvoiceRepository::find_by_order(conn, &order.id).await? {
        return Err(LedgerError::precondition(
            "Order",
            &order.order_number,
            format!("already invoiced as {}", existing.invoice_number),
        ));
    }

    let customer_id = order
        .customer_id
        .as_deref()
        .ok_or_else(|| ValidationError::required("customer_id"))?;
    let customer = CustomerRepository::lock_for_update(conn, customer_id).await?;
    let billing = billing_customer(conn, customer).await?;

    let shipping = match DeliveryNoteRepository::latest_active_for_order(conn, &order.id).await? {
        Some(note) => note.shipping,
        None => order.shipping.clone(),
    };

    let items = OrderRepository::items(conn, &order.id).await?;
    let lines: Vec<InvoiceItem> = items
        .into_iter()
        .map(|item| {
            let amounts = invoice_line(
                item.quantity,
                item.unit_price,
                item.discount_percentage,
                item.vat_percentage,
            );
            InvoiceItem {
                id: new_id(),
                invoice_id: String::new(),
                product_id: item.product_id,
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                is_gift: item.is_gift,
                discount_percentage: item.discount_percentage,
                vat_percentage: item.vat_percentage,
                vat_amount: amounts.vat,
                total_price: amounts.subtotal,
            }
        })
        .collect();

    let source = InvoiceSource {
        order_id: Some(order.id.clone()),
        delivery_note_id: None,
        shipping,
        reference: format!("From order {}", order.order_number),
    };
    insert_invoice(conn, source, &billing, lines, options, attempts, actor, now).await
}

async fn from_delivery_note_in(
    conn: &mut SqliteConnection,
    delivery_note_id: &str,
    options: InvoiceOptions,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Invoice> {
    let note = DeliveryNoteRepository::lock_for_update(conn, delivery_note_id).await?;
    if !note.status.is_active() {
        return Err(LedgerError::precondition(
            "DeliveryNote",
            &note.delivery_note_number,
            "delivery note is cancelled",
        ));
    }
    if let Some(existing) = InvoiceRepository::find_by_delivery_note(conn, &note.id).await? {
        return Err(LedgerError::precondition(
            "DeliveryNote",
            &note.delivery_note_number,
            format!("already invoiced as {}", existing.invoice_number),
        ));
    }

    let customer = CustomerRepository::lock_for_update(conn, &note.customer_id).await?;
    if !customer.is_branch {
        return Err(LedgerError::precondition(
            "Customer",
            &customer.code,
            "delivery note invoices bill the headquarters of a branch",
        ));
    }
    let billing = billing_customer(conn, customer).await?;

    // The order keeps at most one invoice; a cancelled one still holds it.
    let order_id = match note.order_id.as_deref() {
        Some(order_id) => match InvoiceRepository::find_by_order(conn, order_id).await? {
            Some(existing) if existing.status != InvoiceStatus::Cancelled => {
                return Err(LedgerError::precondition(
                    "DeliveryNote",
                    &note.delivery_note_number,
                    format!("order already invoiced as {}", existing.invoice_number),
                ));
            }
            Some(_) => None,
            None => Some(order_id.to_string()),
        },
        None => None,
    };

    let mut lines = Vec::new();
    for item in DeliveryNoteRepository::items(conn, &note.id).await? {
        let Some(product_id) = item.product_id else {
            continue;
        };
        let product = ProductRepository::lock_for_update(conn, &product_id).await?;
        let amounts = invoice_line(item.quantity, product.price, Percent::zero(), product.vat_percentage);
        lines.push(InvoiceItem {
            id: new_id(),
            invoice_id: String::new(),
            product_id: Some(product.id),
            description: item.description,
            quantity: item.quantity,
            unit_price: product.price,
            is_gift: false,
            discount_percentage: Percent::zero(),
            vat_percentage: product.vat_percentage,
            vat_amount: amounts.vat,
            total_price: amounts.subtotal,
        });
    }
    if lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let source = InvoiceSource {
        order_id,
        delivery_note_id: Some(note.id.clone()),
        shipping: note.shipping.clone(),
        reference: format!("From delivery note {}", note.delivery_note_number),
    };
    insert_invoice(conn, source, &billing, lines, options, attempts, actor, now).await
}

struct InvoiceSource {
    order_id: Option<String>,
    delivery_note_id: Option<String>,
    shipping: ShippingDetails,
    reference: String,
}

#[allow(clippy::too_many_arguments)]
async fn insert_invoice(
    conn: &mut SqliteConnection,
    source: InvoiceSource,
    billing: &Customer,
    mut lines: Vec<InvoiceItem>,
    options: InvoiceOptions,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Invoice> {
    validate_percent("discount", options.discount)?;
    if !billing.can_be_invoiced {
        return Err(LedgerError::precondition(
            "Customer",
            &billing.code,
            "customer cannot be invoiced",
        ));
    }

    let amounts: Vec<LineAmounts> = lines
        .iter()
        .map(|line| LineAmounts {
            subtotal: line.total_price,
            vat: line.vat_amount,
        })
        .collect();
    let totals = invoice_totals(&amounts, options.discount);

    let status = if options.as_draft {
        InvoiceStatus::Draft
    } else {
        InvoiceStatus::Issued
    };

    let mut invoice = Invoice {
        id: new_id(),
        invoice_number: String::new(),
        order_id: source.order_id,
        delivery_note_id: source.delivery_note_id,
        customer_id: billing.id.clone(),
        issue_date: options.issue_date.unwrap_or_else(|| now.date_naive()),
        due_date: options.due_date,
        status,
        subtotal: totals.subtotal,
        discount_percentage: options.discount,
        discount_amount: totals.discount_amount,
        vat_amount: totals.vat_amount,
        total_amount: totals.total_amount,
        paid_amount: Money::zero(),
        notes: options.notes,
        shipping: source.shipping,
        created_at: now,
        updated_at: now,
    };
    insert_numbered(conn, &mut invoice, attempts).await?;

    for line in &mut lines {
        line.invoice_id = invoice.id.clone();
        InvoiceRepository::insert_item(conn, line).await?;
    }

    if invoice.status.is_posted() {
        balance::post(
            conn,
            &billing.id,
            PostingKind::InvoiceIssued,
            invoice.total_amount,
            &invoice.invoice_number,
            now,
        )
        .await?;
    }

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("Invoice", &invoice.id, &invoice.invoice_number),
        format!("{}, total {}", source.reference, invoice.total_amount),
        now,
    )
    .await?;

    Ok(invoice)
}

async fn mark_paid_in(
    conn: &mut SqliteConnection,
    id: &str,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Invoice> {
    let invoice = InvoiceRepository::lock_for_update(conn, id).await?;
    invoice.status.transition_to(InvoiceStatus::Paid)?;

    let outstanding = invoice.outstanding_amount();
    if outstanding.is_positive() {
        let mut payment = Payment {
            id: new_id(),
            receipt_number: String::new(),
            customer_id: invoice.customer_id.clone(),
            payment_date: now.date_naive(),
            amount_paid: outstanding,
            payment_method: PaymentMethod::Other,
            reference_number: None,
            notes: Some(format!("Automatic settlement of {}", invoice.invoice_number)),
            status: PaymentStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            recorded_by: actor.id.clone(),
            created_at: now,
        };
        insert_numbered(conn, &mut payment, attempts).await?;
        balance::post(
            conn,
            &payment.customer_id,
            PostingKind::PaymentRecorded,
            payment.amount_paid,
            &payment.receipt_number,
            now,
        )
        .await?;
        PaymentRepository::link_invoice(conn, &payment.id, &invoice.id, now).await?;
        allocation::allocate(conn, &payment, &[invoice.id.clone()], now).await?;

        audit::record(
            conn,
            actor,
            ActionKind::Create,
            Subject::new("Payment", &payment.id, &payment.receipt_number),
            format!("Automatic settlement of {}, {}", invoice.invoice_number, payment.amount_paid),
            now,
        )
        .await?;
    } else {
        InvoiceRepository::set_paid_amount(conn, &invoice.id, invoice.paid_amount, InvoiceStatus::Paid, now)
            .await?;
        let paid = InvoiceRepository::lock_for_update(conn, &invoice.id).await?;
        commission::on_invoice_paid(conn, &paid, now.date_naive()).await?;
    }

    let invoice = InvoiceRepository::lock_for_update(conn, id).await?;
    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("Invoice", &invoice.id, &invoice.invoice_number),
        format!("issued → {}", invoice.status),
        now,
    )
    .await?;

    Ok(invoice)
}

async fn cancel_in(
    conn: &mut SqliteConnection,
    id: &str,
    today: NaiveDate,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Invoice> {
    let mut invoice = InvoiceRepository::lock_for_update(conn, id).await?;
    invoice.status = invoice.status.transition_to(InvoiceStatus::Cancelled)?;
    if invoice.issue_date != today {
        return Err(LedgerError::precondition(
            "Invoice",
            &invoice.invoice_number,
            format!("issued on {}, only same-day cancellation is allowed", invoice.issue_date),
        ));
    }

    balance::post(
        conn,
        &invoice.customer_id,
        PostingKind::InvoiceCancelled,
        invoice.total_amount,
        &invoice.invoice_number,
        now,
    )
    .await?;
    InvoiceRepository::set_status(conn, &invoice.id, invoice.status, now).await?;

    if let Some(note_id) = invoice.delivery_note_id.as_deref() {
        let note = DeliveryNoteRepository::lock_for_update(conn, note_id).await?;
        force_cancel_in(conn, note, actor, now).await?;
    } else if let Some(order_id) = invoice.order_id.as_deref() {
        let order = OrderRepository::lock_for_update(conn, order_id).await?;
        if order.status != OrderStatus::Cancelled {
            cancel_order_in(conn, order, actor, now).await?;
        }
    }

    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("Invoice", &invoice.id, &invoice.invoice_number),
        "issued → cancelled",
        now,
    )
    .await?;

    invoice.updated_at = now;
    Ok(invoice)
}

/// The customer an invoice is billed to: a branch bills its headquarters.
async fn billing_customer(conn: &mut SqliteConnection, customer: Customer) -> LedgerResult<Customer> {
    if !customer.is_branch {
        return Ok(customer);
    }
    let parent_id = customer
        .parent_id
        .as_deref()
        .ok_or_else(|| ValidationError::required("parent_id"))?;
    Ok(CustomerRepository::lock_for_update(conn, parent_id).await?)
}
