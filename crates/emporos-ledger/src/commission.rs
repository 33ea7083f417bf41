//! # Commission Engine
//!
//! Runs when an invoice moves into `paid`.
//!
//! ```text
//! invoice → paid
//!     │
//!     ├── billed customer has a sales rep?          no  → nothing
//!     ├── rep commission_rate > 0?                   no  → nothing
//!     ├── INSERT commission (invoice_id UNIQUE)
//!     │       └── UNIQUE failed → already created, nothing
//!     └── amount = invoice.subtotal × rate, status UNPAID
//! ```

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use emporos_core::pricing::commission_amount;
use emporos_core::{new_id, Commission, CommissionStatus, Invoice};
use emporos_db::{CommissionRepository, CustomerRepository, SalesRepRepository};

use crate::error::LedgerResult;

/// Creates the invoice's commission if one is due. Returns it when created.
pub async fn on_invoice_paid(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
    today: NaiveDate,
) -> LedgerResult<Option<Commission>> {
    let customer = CustomerRepository::lock_for_update(conn, &invoice.customer_id).await?;
    let Some(rep_id) = customer.sales_rep_id.as_deref() else {
        return Ok(None);
    };
    let Some(rep) = SalesRepRepository::find(conn, rep_id).await? else {
        return Ok(None);
    };
    if rep.commission_rate.is_zero() {
        return Ok(None);
    }

    let commission = Commission {
        id: new_id(),
        sales_rep_id: rep.id.clone(),
        invoice_id: invoice.id.clone(),
        calculated_amount: commission_amount(invoice.subtotal, rep.commission_rate),
        calculation_date: today,
        status: CommissionStatus::Unpaid,
        paid_date: None,
    };

    match CommissionRepository::insert(conn, &commission).await {
        Ok(()) => {
            info!(
                invoice = %invoice.invoice_number,
                rep = %rep.name,
                amount = %commission.calculated_amount,
                "Commission created"
            );
            Ok(Some(commission))
        }
        Err(e) if e.is_unique_violation_on("commissions.invoice_id") => {
            debug!(invoice = %invoice.invoice_number, "Commission already exists");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
