//! # Payments
//!
//! ```text
//! record_payment ──► ACTIVE ──cancel_payment(reason)──► CANCELLED
//!                     │ −amount                          +amount
//!                     │
//!                     └── link_payment_invoices ──► allocation over the new links
//! ```
//!
//! `amount_paid` never changes after insert. Cancelling a payment restores
//! the balance but leaves invoice `paid_amount` where allocation put it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use emporos_core::allocation::AllocationStep;
use emporos_core::validation::{validate_payment_amount, validate_reason};
use emporos_core::{
    new_id, ActionKind, Actor, InvoiceStatus, Lifecycle, Money, Payment, PaymentMethod,
    PaymentStatus, PostingKind, ValidationError,
};
use emporos_db::{CustomerRepository, InvoiceRepository, PaymentRepository};

use crate::allocation;
use crate::audit::{self, Subject};
use crate::balance;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::numbering::insert_numbered;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub customer_id: String,
    pub payment_date: NaiveDate,
    pub amount_paid: Money,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    /// Invoices to allocate against, in any order.
    #[serde(default)]
    pub invoice_ids: Vec<String>,
}

impl Ledger {
    pub async fn record_payment(&self, input: NewPayment, actor: &Actor) -> LedgerResult<Payment> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let payment = record_in(tx.conn(), input, attempts, actor, now)
            .await
            .map_err(|e| rejected("record_payment", e))?;

        tx.commit().await?;
        info!(
            number = %payment.receipt_number,
            amount = %payment.amount_paid,
            actor = %actor.name,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Links more invoices to a payment and allocates over the new links.
    ///
    /// Already linked invoices are skipped. A cancelled payment links nothing.
    pub async fn link_payment_invoices(
        &self,
        payment_id: &str,
        invoice_ids: &[String],
        actor: &Actor,
    ) -> LedgerResult<Vec<AllocationStep>> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let payment = PaymentRepository::lock_for_update(tx.conn(), payment_id).await?;
            if payment.status == PaymentStatus::Cancelled {
                debug!(number = %payment.receipt_number, "Payment cancelled, links ignored");
                return Ok((payment, Vec::new()));
            }
            let steps = link_and_allocate(tx.conn(), &payment, invoice_ids, now).await?;
            if !steps.is_empty() {
                audit::record(
                    tx.conn(),
                    actor,
                    ActionKind::Update,
                    Subject::new("Payment", &payment.id, &payment.receipt_number),
                    format!("Linked {} invoice(s)", steps.len()),
                    now,
                )
                .await?;
            }
            Ok::<_, LedgerError>((payment, steps))
        }
        .await;
        let (payment, steps) = result.map_err(|e| rejected("link_payment_invoices", e))?;

        tx.commit().await?;
        info!(number = %payment.receipt_number, linked = steps.len(), actor = %actor.name, "Payment invoices linked");
        Ok(steps)
    }

    pub async fn cancel_payment(&self, id: &str, reason: &str, actor: &Actor) -> LedgerResult<Payment> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let payment = cancel_in(tx.conn(), id, reason, actor, now)
            .await
            .map_err(|e| rejected("cancel_payment", e))?;

        tx.commit().await?;
        info!(
            number = %payment.receipt_number,
            amount = %payment.amount_paid,
            actor = %actor.name,
            "Payment cancelled"
        );
        Ok(payment)
    }
}

// =============================================================================
// Inside the write transaction
// =============================================================================

async fn record_in(
    conn: &mut SqliteConnection,
    input: NewPayment,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Payment> {
    validate_payment_amount(input.amount_paid)?;
    let customer = CustomerRepository::lock_for_update(conn, &input.customer_id).await?;

    let mut payment = Payment {
        id: new_id(),
        receipt_number: String::new(),
        customer_id: customer.id.clone(),
        payment_date: input.payment_date,
        amount_paid: input.amount_paid,
        payment_method: input.payment_method,
        reference_number: input.reference_number,
        notes: input.notes,
        status: PaymentStatus::Active,
        cancellation_reason: None,
        cancelled_by: None,
        cancelled_at: None,
        recorded_by: actor.id.clone(),
        created_at: now,
    };

    // Invoices are checked before anything is written.
    check_invoices(conn, &payment, &input.invoice_ids).await?;

    insert_numbered(conn, &mut payment, attempts).await?;
    balance::post(
        conn,
        &customer.id,
        PostingKind::PaymentRecorded,
        payment.amount_paid,
        &payment.receipt_number,
        now,
    )
    .await?;
    link_and_allocate(conn, &payment, &input.invoice_ids, now).await?;

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("Payment", &payment.id, &payment.receipt_number),
        format!("{} from {}", payment.amount_paid, customer.display_name()),
        now,
    )
    .await?;

    Ok(payment)
}

/// Links `invoice_ids` and allocates over the links that are new.
async fn link_and_allocate(
    conn: &mut SqliteConnection,
    payment: &Payment,
    invoice_ids: &[String],
    now: DateTime<Utc>,
) -> LedgerResult<Vec<AllocationStep>> {
    check_invoices(conn, payment, invoice_ids).await?;

    let mut fresh = Vec::new();
    for invoice_id in invoice_ids {
        if PaymentRepository::link_invoice(conn, &payment.id, invoice_id, now).await? {
            fresh.push(invoice_id.clone());
        }
    }
    allocation::allocate(conn, payment, &fresh, now).await
}

/// Linked invoices belong to the payment's customer and are posted.
async fn check_invoices(
    conn: &mut SqliteConnection,
    payment: &Payment,
    invoice_ids: &[String],
) -> LedgerResult<()> {
    for invoice_id in invoice_ids {
        let invoice = InvoiceRepository::lock_for_update(conn, invoice_id).await?;
        if invoice.customer_id != payment.customer_id {
            return Err(ValidationError::InvalidFormat {
                field: "invoice_ids".to_string(),
                reason: format!("{} belongs to another customer", invoice.invoice_number),
            }
            .into());
        }
        if matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            return Err(LedgerError::precondition(
                "Invoice",
                &invoice.invoice_number,
                format!("a {} invoice cannot take payments", invoice.status),
            ));
        }
    }
    Ok(())
}

async fn cancel_in(
    conn: &mut SqliteConnection,
    id: &str,
    reason: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<Payment> {
    validate_reason(reason)?;
    let mut payment = PaymentRepository::lock_for_update(conn, id).await?;
    payment.status = payment.status.transition_to(PaymentStatus::Cancelled)?;

    balance::post(
        conn,
        &payment.customer_id,
        PostingKind::PaymentCancelled,
        payment.amount_paid,
        &payment.receipt_number,
        now,
    )
    .await?;
    PaymentRepository::cancel(conn, &payment.id, reason.trim(), &actor.id, now).await?;

    audit::record(
        conn,
        actor,
        ActionKind::StatusChange,
        Subject::new("Payment", &payment.id, &payment.receipt_number),
        format!("active → cancelled: {}", reason.trim()),
        now,
    )
    .await?;

    payment.cancellation_reason = Some(reason.trim().to_string());
    payment.cancelled_by = Some(actor.id.clone());
    payment.cancelled_at = Some(now);
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::invoices::InvoiceOptions;
    use crate::testing::{completed_order_for, customer_input, ledger};
    use emporos_core::{Customer, Invoice};

    async fn issued_invoice(ledger: &Ledger, customer: &Customer) -> Invoice {
        let (order, _product) = completed_order_for(ledger, customer, 1).await;
        ledger
            .create_invoice_from_order(&order.id, InvoiceOptions::default(), &Actor::system())
            .await
            .unwrap()
    }

    fn payment_input(customer: &Customer, cents: i64, invoice_ids: Vec<String>) -> NewPayment {
        NewPayment {
            customer_id: customer.id.clone(),
            payment_date: Utc::now().date_naive(),
            amount_paid: Money::from_cents(cents),
            payment_method: PaymentMethod::BankTransfer,
            reference_number: None,
            notes: None,
            invoice_ids,
        }
    }

    async fn balance_of(ledger: &Ledger, customer: &Customer) -> Money {
        ledger.database().customers().get_by_id(&customer.id).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let invoice = issued_invoice(&ledger, &customer).await;

        let first = ledger
            .record_payment(payment_input(&customer, 5_000, vec![invoice.id.clone()]), &actor)
            .await
            .unwrap();
        assert!(first.receipt_number.starts_with("PAY-"));

        let partly = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(partly.paid_amount, Money::from_cents(5_000));
        assert_eq!(partly.status, InvoiceStatus::Issued);

        ledger
            .record_payment(payment_input(&customer, 7_400, vec![invoice.id.clone()]), &actor)
            .await
            .unwrap();
        let paid = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(paid.paid_amount, Money::from_cents(12_400));
        assert_eq!(paid.status, InvoiceStatus::Paid);

        assert_eq!(balance_of(&ledger, &customer).await, Money::zero());
        assert!(ledger.reconcile_customer(&customer.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_full_amount_offered_to_each_invoice() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let a = issued_invoice(&ledger, &customer).await;
        let b = issued_invoice(&ledger, &customer).await;

        ledger
            .record_payment(payment_input(&customer, 12_400, vec![a.id.clone(), b.id.clone()]), &actor)
            .await
            .unwrap();

        for id in [&a.id, &b.id] {
            let invoice = ledger.database().invoices().get_by_id(id).await.unwrap().unwrap();
            assert_eq!(invoice.status, InvoiceStatus::Paid);
        }
        // Two invoices posted, one payment posted.
        assert_eq!(balance_of(&ledger, &customer).await, Money::from_cents(12_400));
        assert!(ledger.reconcile_customer(&customer.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_invoice_of_another_customer_rejected() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let alpha = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let beta = ledger.create_customer(customer_input("Beta"), &actor).await.unwrap();
        let invoice = issued_invoice(&ledger, &alpha).await;

        let err = ledger
            .record_payment(payment_input(&beta, 1_000, vec![invoice.id.clone()]), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(balance_of(&ledger, &beta).await, Money::zero());
        assert!(ledger.database().payments().list_for_customer(&beta.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();

        let err = ledger
            .record_payment(payment_input(&customer, 0, Vec::new()), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_cancel_restores_balance_once() {
        let ledger = ledger().await;
        let actor = Actor::new("u2", "giorgos");
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let invoice = issued_invoice(&ledger, &customer).await;
        let payment = ledger
            .record_payment(payment_input(&customer, 12_400, vec![invoice.id.clone()]), &actor)
            .await
            .unwrap();

        let err = ledger.cancel_payment(&payment.id, "  ", &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let cancelled = ledger.cancel_payment(&payment.id, "bounced", &actor).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by.as_deref(), Some("u2"));
        assert_eq!(balance_of(&ledger, &customer).await, Money::from_cents(12_400));

        let invoice = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount, Money::from_cents(12_400));

        let err = ledger.cancel_payment(&payment.id, "again", &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(balance_of(&ledger, &customer).await, Money::from_cents(12_400));
        assert!(ledger.reconcile_customer(&customer.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_links_allocate_once() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let invoice = issued_invoice(&ledger, &customer).await;
        let payment = ledger
            .record_payment(payment_input(&customer, 5_000, Vec::new()), &actor)
            .await
            .unwrap();

        let steps = ledger
            .link_payment_invoices(&payment.id, &[invoice.id.clone()], &actor)
            .await
            .unwrap();
        assert_eq!(steps.len(), 1);

        let steps = ledger
            .link_payment_invoices(&payment.id, &[invoice.id.clone()], &actor)
            .await
            .unwrap();
        assert!(steps.is_empty());

        let invoice = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount, Money::from_cents(5_000));
    }

    #[tokio::test]
    async fn test_cancelled_payment_ignores_links() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = ledger.create_customer(customer_input("Alpha"), &actor).await.unwrap();
        let invoice = issued_invoice(&ledger, &customer).await;
        let payment = ledger
            .record_payment(payment_input(&customer, 5_000, Vec::new()), &actor)
            .await
            .unwrap();
        ledger.cancel_payment(&payment.id, "duplicate", &actor).await.unwrap();

        let steps = ledger
            .link_payment_invoices(&payment.id, &[invoice.id.clone()], &actor)
            .await
            .unwrap();
        assert!(steps.is_empty());
        let linked = ledger.database().payments().get_linked_invoice_ids(&payment.id).await.unwrap();
        assert!(linked.is_empty());
    }
}
