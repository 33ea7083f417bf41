//! # Customer Balance Ledger
//!
//! `customers.balance` is kept incrementally; every change is paired with a
//! `balance_postings` row.
//!
//! ```text
//! ┌──────────────────────┬──────┬───────────────────────────────────────┐
//! │ PostingKind          │ sign │ fired by                              │
//! ├──────────────────────┼──────┼───────────────────────────────────────┤
//! │ InvoiceIssued        │  +   │ invoice created as issued / issued    │
//! │ InvoiceCancelled     │  −   │ cancel_invoice                        │
//! │ PaymentRecorded      │  −   │ record_payment, mark_invoice_paid     │
//! │ PaymentCancelled     │  +   │ cancel_payment                        │
//! │ CreditNoteIssued     │  −   │ create_credit_note                    │
//! └──────────────────────┴──────┴───────────────────────────────────────┘
//! ```
//!
//! [`reconcile`] recomputes the balance two more ways: from the documents
//! and from the journal. All three agree after every committed operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use emporos_core::{new_id, BalancePosting, Money, PostingKind};
use emporos_db::{
    CreditNoteRepository, CustomerRepository, InvoiceRepository, JournalRepository,
    PaymentRepository,
};

use crate::error::LedgerResult;

/// Posts `amount` (a document amount, unsigned) with the sign of `kind`.
/// Returns the new balance.
pub async fn post(
    conn: &mut SqliteConnection,
    customer_id: &str,
    kind: PostingKind,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> LedgerResult<Money> {
    let signed = Money::from_cents(amount.cents() * kind.sign());
    let balance = CustomerRepository::apply_balance_delta(conn, customer_id, signed, now).await?;

    let posting = BalancePosting {
        id: new_id(),
        customer_id: customer_id.to_string(),
        amount: signed,
        kind,
        reference: reference.to_string(),
        created_at: now,
    };
    JournalRepository::insert_posting(conn, &posting).await?;

    Ok(balance)
}

/// A customer's balance three ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// `customers.balance`
    pub recorded: Money,
    /// Σ posted invoices − Σ active payments − Σ issued credit notes
    pub derived: Money,
    /// Σ balance postings
    pub journal: Money,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.derived && self.recorded == self.journal
    }
}

pub async fn reconcile(conn: &mut SqliteConnection, customer_id: &str) -> LedgerResult<Reconciliation> {
    let customer = CustomerRepository::lock_for_update(conn, customer_id).await?;

    let invoiced = InvoiceRepository::posted_total_for_customer(conn, customer_id).await?;
    let paid = PaymentRepository::active_total_for_customer(conn, customer_id).await?;
    let credited = CreditNoteRepository::issued_total_for_customer(conn, customer_id).await?;
    let journal = JournalRepository::posting_sum(conn, customer_id).await?;

    Ok(Reconciliation {
        recorded: customer.balance,
        derived: invoiced - paid - credited,
        journal,
    })
}
