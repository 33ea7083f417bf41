//! # Retail Receipts
//!
//! Counter sales. Stock leaves immediately; nothing is posted to a balance.
//!
//! ```text
//! create_retail_receipt ──► RETAIL-YYYY-NNNNN, stock −= qty  (retail_sale)
//! delete_retail_receipt ──► stock += qty, receipt and lines removed
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use emporos_core::pricing::{retail_line, sum_lines, LineAmounts};
use emporos_core::validation::{check_stock, validate_line_quantity, validate_percent, validate_price};
use emporos_core::{
    new_id, ActionKind, Actor, Customer, Money, Percent, Quantity, RetailReceipt, RetailReceiptItem,
    RetailReceiptStatus, StockReason, ValidationError,
};
use emporos_db::{CustomerRepository, ProductRepository, RetailReceiptRepository};

use crate::audit::{self, Subject};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{rejected, Ledger};
use crate::numbering::insert_numbered;
use crate::stock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRetailLine {
    pub product_id: String,
    pub quantity: Quantity,
    /// Defaults to the product's price.
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub discount_percentage: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRetailReceipt {
    /// Falls back to the configured retail customer.
    pub customer_id: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub lines: Vec<NewRetailLine>,
}

impl Ledger {
    pub async fn create_retail_receipt(
        &self,
        input: NewRetailReceipt,
        actor: &Actor,
    ) -> LedgerResult<RetailReceipt> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let receipt = create_in(tx.conn(), input, self, actor, now)
            .await
            .map_err(|e| rejected("create_retail_receipt", e))?;

        tx.commit().await?;
        info!(
            number = %receipt.receipt_number,
            total = %receipt.total_amount,
            actor = %actor.name,
            "Retail receipt issued"
        );
        Ok(receipt)
    }

    /// Gives the stock back and removes the receipt.
    pub async fn delete_retail_receipt(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let result = async {
            let receipt = RetailReceiptRepository::lock_for_update(tx.conn(), id).await?;
            for item in RetailReceiptRepository::items(tx.conn(), &receipt.id).await? {
                if let Some(product_id) = item.product_id.as_deref() {
                    stock::adjust(
                        tx.conn(),
                        product_id,
                        item.quantity,
                        StockReason::RetailReceiptDeleted,
                        Some(receipt.receipt_number.as_str()),
                        now,
                    )
                    .await?;
                }
            }
            RetailReceiptRepository::delete(tx.conn(), &receipt.id).await?;

            audit::record(
                tx.conn(),
                actor,
                ActionKind::Delete,
                Subject::new("RetailReceipt", &receipt.id, &receipt.receipt_number),
                format!("Deleted, total {}", receipt.total_amount),
                now,
            )
            .await?;
            Ok::<_, LedgerError>(receipt)
        }
        .await;
        let receipt = result.map_err(|e| rejected("delete_retail_receipt", e))?;

        tx.commit().await?;
        info!(number = %receipt.receipt_number, actor = %actor.name, "Retail receipt deleted");
        Ok(())
    }
}

async fn create_in(
    conn: &mut SqliteConnection,
    input: NewRetailReceipt,
    ledger: &Ledger,
    actor: &Actor,
    now: DateTime<Utc>,
) -> LedgerResult<RetailReceipt> {
    let customer = match input.customer_id.as_deref() {
        Some(id) => CustomerRepository::lock_for_update(conn, id).await?,
        None => retail_customer(conn, ledger).await?,
    };

    if input.lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let mut taken: HashMap<String, Quantity> = HashMap::new();
    let mut items = Vec::with_capacity(input.lines.len());
    for (index, line) in input.lines.iter().enumerate() {
        let line_no = index + 1;
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id").at_line(line_no).into());
        }
        let product = ProductRepository::lock_for_update(conn, &line.product_id).await?;
        validate_line_quantity(line.quantity, Some(product.unit_of_measurement))
            .map_err(|e| e.at_line(line_no))?;
        validate_percent("discount_percentage", line.discount_percentage).map_err(|e| e.at_line(line_no))?;

        let requested = taken.entry(product.id.clone()).or_insert_with(Quantity::zero);
        *requested += line.quantity;
        check_stock(&product.code, product.stock_quantity, *requested).map_err(|e| e.at_line(line_no))?;

        let unit_price = line.unit_price.unwrap_or(product.price);
        validate_price("unit_price", unit_price).map_err(|e| e.at_line(line_no))?;
        let amounts = retail_line(line.quantity, unit_price, line.discount_percentage, product.vat_percentage);

        items.push(RetailReceiptItem {
            id: new_id(),
            receipt_id: String::new(),
            product_id: Some(product.id.clone()),
            description: product.name.clone(),
            quantity: line.quantity,
            unit_price,
            discount_percentage: line.discount_percentage,
            subtotal: amounts.subtotal,
            vat_amount: amounts.vat,
            final_price: amounts.final_price,
        });
    }

    let lines: Vec<LineAmounts> = items
        .iter()
        .map(|item| LineAmounts {
            subtotal: item.subtotal,
            vat: item.vat_amount,
        })
        .collect();
    let totals = sum_lines(&lines);

    let mut receipt = RetailReceipt {
        id: new_id(),
        receipt_number: String::new(),
        customer_id: customer.id.clone(),
        issue_date: input.issue_date,
        subtotal: totals.subtotal,
        vat_amount: totals.vat_amount,
        total_amount: totals.total_amount,
        status: RetailReceiptStatus::Issued,
        created_at: now,
    };
    insert_numbered(conn, &mut receipt, ledger.numbering_retries()).await?;

    for item in &mut items {
        item.receipt_id = receipt.id.clone();
        RetailReceiptRepository::insert_item(conn, item).await?;
        if let Some(product_id) = item.product_id.as_deref() {
            stock::adjust(
                conn,
                product_id,
                -item.quantity,
                StockReason::RetailSale,
                Some(receipt.receipt_number.as_str()),
                now,
            )
            .await?;
        }
    }

    audit::record(
        conn,
        actor,
        ActionKind::Create,
        Subject::new("RetailReceipt", &receipt.id, &receipt.receipt_number),
        format!("{} line(s), total {}", items.len(), receipt.total_amount),
        now,
    )
    .await?;

    Ok(receipt)
}

/// The configured walk-in customer. It must already exist.
async fn retail_customer(conn: &mut SqliteConnection, ledger: &Ledger) -> LedgerResult<Customer> {
    let code = &ledger.config().retail_customer_code;
    CustomerRepository::find_by_code(conn, code)
        .await?
        .ok_or_else(|| LedgerError::not_found("Customer", code.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::reference::NewCustomer;
    use crate::testing::{customer_input, ledger, product_input, stock_of};
    use emporos_core::CoreError;

    fn sale(product_id: &str, units: i64) -> NewRetailReceipt {
        NewRetailReceipt {
            customer_id: None,
            issue_date: Utc::now(),
            lines: vec![NewRetailLine {
                product_id: product_id.to_string(),
                quantity: Quantity::units(units),
                ..NewRetailLine::default()
            }],
        }
    }

    async fn with_retail_customer(ledger: &Ledger) -> Customer {
        let input = NewCustomer {
            code: Some(ledger.config().retail_customer_code.clone()),
            ..customer_input("Retail")
        };
        ledger.create_customer(input, &Actor::system()).await.unwrap()
    }

    #[tokio::test]
    async fn test_sale_and_delete_move_stock() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let customer = with_retail_customer(&ledger).await;
        let product = ledger.create_product(product_input("SKU1", 10), &actor).await.unwrap();

        let receipt = ledger.create_retail_receipt(sale(&product.id, 2), &actor).await.unwrap();
        assert!(receipt.receipt_number.starts_with("RETAIL-"));
        assert_eq!(receipt.customer_id, customer.id);
        assert_eq!(receipt.total_amount, Money::from_cents(24_800));
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(8));

        let balance = ledger.database().customers().get_by_id(&customer.id).await.unwrap().unwrap().balance;
        assert_eq!(balance, Money::zero());

        ledger.delete_retail_receipt(&receipt.id, &actor).await.unwrap();
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(10));
        assert!(ledger.stock_conservation(&product.id).await.unwrap().holds());
    }

    #[tokio::test]
    async fn test_sale_beyond_stock_rejected() {
        let ledger = ledger().await;
        let actor = Actor::system();
        with_retail_customer(&ledger).await;
        let product = ledger.create_product(product_input("SKU1", 3), &actor).await.unwrap();

        let err = ledger.create_retail_receipt(sale(&product.id, 4), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(err, LedgerError::Core(CoreError::Line { line: 1, .. })));
        assert_eq!(stock_of(&ledger, &product.id).await, Quantity::units(3));
    }

    #[tokio::test]
    async fn test_missing_retail_customer() {
        let ledger = ledger().await;
        let actor = Actor::system();
        let product = ledger.create_product(product_input("SKU1", 3), &actor).await.unwrap();

        let err = ledger.create_retail_receipt(sale(&product.id, 1), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
