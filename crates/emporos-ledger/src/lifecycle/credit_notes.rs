//! # Credit Notes
//!
//! Returns against an issued or paid invoice.
//!
//! ```text
//! create_credit_note(invoice, [ReturnLine])
//!     │
//!     ├── every line checked first: belongs to the invoice,
//!     │   Σ qty per invoice line ≤ invoiced qty, whole units for pcs
//!     ├── CN-YYYY-NNNN
//!     ├── stock += qty           (credit_note_return)
//!     ├── balance −= total
//!     ├── invoice → credited
//!     └── status ISSUED
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use emporos_core::pricing::{credit_note_line, sum_lines};
use emporos_core::validation::{validate_line_quantity, validate_within_limit};
use emporos_core::{
    new_id, ActionKind, Actor, CreditNote, CreditNoteItem, CreditNoteStatus, InvoiceItem,
    InvoiceStatus, Lifecycle, PostingKind, Quantity, StockReason, ValidationError,
};
use emporos_db::{CreditNoteRepository, InvoiceRepository, ProductRepository};

use crate::audit::{self, Subject};
use crate::balance;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::numbering::insert_numbered;
use crate::stock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLine {
    pub invoice_item_id: String,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNoteRequest {
    pub issue_date: NaiveDate,
    pub reason: Option<String>,
    /// Lines with a zero quantity are ignored.
    pub lines: Vec<ReturnLine>,
}

impl Ledger {
    pub async fn create_credit_note(
        &self,
        invoice_id: &str,
        request: CreditNoteRequest,
        actor: &Actor,
    ) -> LedgerResult<CreditNote> {
        let now = Utc::now();
        let attempts = self.numbering_retries();
        let mut tx = self.begin_write().await?;

        let note = create_in(tx.conn(), invoice_id, request, attempts, actor, now)
            .await
            .map_err(|e| rejected("create_credit_note", e))?;

        tx.commit().await?;
        info!(
            number = %note.credit_note_number,
            total = %note.total_amount,
            actor = %actor.name,
            "Credit note issued"
        );
        Ok(note)
    }
}

async fn create_in(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    request: CreditNoteRequest,
    attempts: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<CreditNote> {
    let invoice = InvoiceRepository::lock_for_update(conn, invoice_id).await?;
    if !invoice.status.is_creditable() {
        return Err(LedgerError::precondition(
            "Invoice",
            &invoice.invoice_number,
            format!("a {} invoice cannot be credited", invoice.status),
        ));
    }

    let invoiced: HashMap<String, InvoiceItem> = InvoiceRepository::items(conn, &invoice.id)
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    // Validation pass. Nothing is written until every line is accepted.
    let mut returned = Vec::new();
    let mut per_item: HashMap<&str, Quantity> = HashMap::new();
    for (index, line) in request.lines.iter().enumerate() {
        let line_no = index + 1;
        if line.quantity.is_zero() {
            continue;
        }
        let item = invoiced.get(&line.invoice_item_id).ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "invoice_item_id".to_string(),
                reason: format!("not a line of {}", invoice.invoice_number),
            }
            .at_line(line_no)
        })?;

        let unit = match item.product_id.as_deref() {
            Some(product_id) => {
                let product = ProductRepository::lock_for_update(conn, product_id).await?;
                Some(product.unit_of_measurement)
            }
            None => None,
        };
        validate_line_quantity(line.quantity, unit).map_err(|e| e.at_line(line_no))?;

        // Several lines may return against the same invoice line.
        let total = per_item.entry(item.id.as_str()).or_insert_with(Quantity::zero);
        *total += line.quantity;
        validate_within_limit("quantity", *total, item.quantity).map_err(|e| e.at_line(line_no))?;

        returned.push((item, line.quantity));
    }
    if returned.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let mut lines = Vec::with_capacity(returned.len());
    let mut amounts = Vec::with_capacity(returned.len());
    for (item, quantity) in returned {
        let line = credit_note_line(quantity, item.unit_price, item.vat_percentage);
        lines.push(CreditNoteItem {
            id: new_id(),
            credit_note_id: String::new(),
            invoice_item_id: Some(item.id.clone()),
            product_id: item.product_id.clone(),
            description: item.description.clone(),
            quantity,
            unit_price: item.unit_price,
            vat_percentage: item.vat_percentage,
            total_price: line.subtotal,
            vat_amount: line.vat,
        });
        amounts.push(line);
    }
    let totals = sum_lines(&amounts);

    let mut note = CreditNote {
        id: new_id(),
        credit_note_number: String::new(),
        customer_id: invoice.customer_id.clone(),
        original_invoice_id: Some(invoice.id.clone()),
        issue_date: request.issue_date,
        reason: request.reason,
        status: CreditNoteStatus::Issued,
        subtotal: totals.subtotal,
        vat_amount: totals.vat_amount,
        total_amount: totals.total_amount,
        created_at: now,
    };
    insert_numbered(conn, &mut note, attempts).await?;

    for line in &mut lines {
        line.credit_note_id = note.id.clone();
        CreditNoteRepository::insert_item(conn, line).await?;
        if let Some(product_id) = line.product_id.as_deref() {
            stock::adjust(
                conn,
                product_id,
                line.quantity,
                StockReason::CreditNoteReturn,
                Some(note.credit_note_number.as_str()),
                now,
            )
            .await?;
        }
    }

    balance::post(
        conn,
        &note.customer_id,
        PostingKind::CreditNoteIssued,
        note.total_amount,
        &note.credit_note_number,
        now,
    )
    .await?;

    let status = invoice.status.transition_to(InvoiceStatus::Credited)?;
    InvoiceRepository::set_status(conn, &invoice.id, status, now).await?;

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("CreditNote", &note.id, &note.credit_note_number),
        format!("Against {}, total {}", invoice.invoice_number, note.total_amount),
        now,
    )
    .await?;

    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::invoices::InvoiceOptions;
    use crate::testing::{completed_order, ledger, stock_of};
    use emporos_core::Money;

    fn request(item_id: &str, units: i64) -> CreditNoteRequest {
        CreditNoteRequest {
            issue_date: Utc::now().date_naive(),
            reason: Some("damaged".to_string()),
            lines: vec![ReturnLine {
                invoice_item_id: item_id.to_string(),
                quantity: Quantity::units(units),
            }],
        }
    }

    #[tokio::test]
    async fn test_return_limited_by_invoiced_quantity() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, customer, product) = completed_order(&ledger, 5).await;
        let invoice = ledger
            .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
            .await
            .unwrap();
        let items = ledger.database().invoices().get_items(&invoice.id).await.unwrap();
        let item_id = items[0].id.clone();

        let err = ledger.create_credit_note(&invoice.id, request(&item_id, 6), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));
        let balance = ledger.database().customers().get_by_id(&customer.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, Money::from_cents(62_000));

        let note = ledger.create_credit_note(&invoice.id, request(&item_id, 3), &actor).await.unwrap();
        assert!(note.credit_note_number.starts_with("CN-"));
        assert_eq!(note.status, CreditNoteStatus::Issued);
        assert_eq!(note.total_amount, Money::from_cents(37_200));
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(18));

        let balance = ledger.database().customers().get_by_id(&customer.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, Money::from_cents(24_800));
        let invoice = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Credited);

        assert!(ledger.reconcile_customer(&customer.id).await.unwrap().is_consistent());
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_split_return_limited_by_invoiced_quantity() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, customer, product) = completed_order(&ledger, 5).await;
        let invoice = ledger
            .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
            .await
            .unwrap();
        let items = ledger.database().invoices().get_items(&invoice.id).await.unwrap();

        let mut split = request(&items[0].id, 3);
        split.lines.push(ReturnLine {
            invoice_item_id: items[0].id.clone(),
            quantity: Quantity::units(3),
        });
        let err = ledger.create_credit_note(&invoice.id, split, &actor).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(emporos_core::CoreError::Validation(ValidationError::Line { line: 2, .. }))
        ));

        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(15));
        let balance = ledger.database().customers().get_by_id(&customer.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, Money::from_cents(62_000));
        let invoice = ledger.database().invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Issued);

        let mut split = request(&items[0].id, 3);
        split.lines.push(ReturnLine {
            invoice_item_id: items[0].id.clone(),
            quantity: Quantity::units(2),
        });
        let note = ledger.create_credit_note(&invoice.id, split, &actor).await.unwrap();
        assert_eq!(note.total_amount, Money::from_cents(62_000));
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(20));
        assert!(ledger.reconcile_customer(&customer.id).await.unwrap().is_consistent());
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_credited_invoice_takes_no_second_note() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, _product) = completed_order(&ledger, 5).await;
        let invoice = ledger
            .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
            .await
            .unwrap();
        let items = ledger.database().invoices().get_items(&invoice.id).await.unwrap();

        ledger.create_credit_note(&invoice.id, request(&items[0].id, 1), &actor).await.unwrap();
        let err = ledger
            .create_credit_note(&invoice.id, request(&items[0].id, 1), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_draft_invoice_not_creditable() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, _product) = completed_order(&ledger, 2).await;
        let options = InvoiceOptions {
            as_draft: true,
            ..InvoiceOptions::default()
        };
        let invoice = ledger.create_invoice_from_order(&order.id, options, &actor).await.unwrap();
        let items = ledger.database().invoices().get_items(&invoice.id).await.unwrap();

        let err = ledger
            .create_credit_note(&invoice.id, request(&items[0].id, 1), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_all_zero_lines_rejected() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let (order, _customer, _product) = completed_order(&ledger, 2).await;
        let invoice = ledger
            .create_invoice_from_order(&order.id, InvoiceOptions::default(), &actor)
            .await
            .unwrap();
        let items = ledger.database().invoices().get_items(&invoice.id).await.unwrap();

        let err = ledger
            .create_credit_note(&invoice.id, request(&items[0].id, 0), &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
