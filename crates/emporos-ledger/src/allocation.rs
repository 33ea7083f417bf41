//! # Payment Allocation Engine
//!
//! Applies an active payment to invoices newly linked to it.
//!
//! ```text
//! allocate(payment, [inv-a, inv-b])
//!     │
//!     ├── payment cancelled?  → nothing
//!     ├── read each invoice on the WriteTx
//!     ├── plan_allocation (emporos-core): (issue_date, id) order,
//!     │   full payment amount offered to each invoice
//!     └── per step:
//!           invoices.paid_amount        = new_paid_amount
//!           payment_invoices.applied    = applied
//!           outstanding ≤ 0 and issued  → paid → commission engine
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use emporos_core::allocation::{plan_allocation, AllocationStep, AllocationTarget};
use emporos_core::{InvoiceStatus, Lifecycle, Payment, PaymentStatus};
use emporos_db::{InvoiceRepository, PaymentRepository};

use crate::commission;
use crate::error::LedgerResult;

/// Runs allocation over `invoice_ids`. Returns the steps that were written.
pub async fn allocate(
    conn: &mut SqliteConnection,
    payment: &Payment,
    invoice_ids: &[String],
    now: DateTime<Utc>,
) -> LedgerResult<Vec<AllocationStep>> {
    if payment.status != PaymentStatus::Active || invoice_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut targets = Vec::with_capacity(invoice_ids.len());
    for invoice_id in invoice_ids {
        let invoice = InvoiceRepository::lock_for_update(conn, invoice_id).await?;
        targets.push(AllocationTarget {
            invoice_id: invoice.id,
            issue_date: invoice.issue_date,
            total_amount: invoice.total_amount,
            paid_amount: invoice.paid_amount,
        });
    }

    let steps = plan_allocation(payment.amount_paid, targets);

    for step in &steps {
        let invoice = InvoiceRepository::lock_for_update(conn, &step.invoice_id).await?;
        let becomes_paid = step.settles && invoice.status.allows(InvoiceStatus::Paid);
        let status = if becomes_paid { InvoiceStatus::Paid } else { invoice.status };

        InvoiceRepository::set_paid_amount(conn, &invoice.id, step.new_paid_amount, status, now).await?;
        PaymentRepository::set_applied_amount(conn, &payment.id, &invoice.id, step.applied).await?;

        debug!(
            payment = %payment.receipt_number,
            invoice = %invoice.invoice_number,
            applied = %step.applied,
            status = %status,
            "Allocated payment"
        );

        if becomes_paid {
            commission::on_invoice_paid(conn, &invoice, now.date_naive()).await?;
        }
    }

    Ok(steps)
}
