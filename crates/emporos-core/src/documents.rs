//! # Documents
//!
//! Commercial documents and their lines.
//!
//! ## Document Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Order ──(completed)──► DeliveryNote ──(branch)──► Invoice            │
//! │     │                                                  ▲   │            │
//! │     └──────────────(completed)─────────────────────────┘   │            │
//! │                                                            ▼            │
//! │   Payment ◄──(links, FIFO allocation)───────────────── paid_amount      │
//! │                                                            │            │
//! │   CreditNote ◄──(returns, issued|paid)─────────────────────┘            │
//! │                                                                         │
//! │   PurchaseOrder ──(receive)──► StockReceipt ──► Product.stock          │
//! │   RetailReceipt ──(sale)─────────────────────► Product.stock          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parents own their lines: deleting a parent deletes its lines, and any
//! stock reversal for those lines is done exactly once by the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::quantity::Quantity;
use crate::status::{
    CommissionStatus, CreditNoteStatus, DeliveryNoteStatus, InvoiceStatus, OrderStatus,
    PaymentStatus, PurchaseOrderStatus, RetailReceiptStatus,
};
use crate::types::ShippingDetails;

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    pub status: OrderStatus,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    /// Σ line totals (VAT included).
    pub total_amount: Money,
    pub comments: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: Quantity,
    pub is_gift: bool,
    pub unit_price: Money,
    pub discount_percentage: Percent,
    pub vat_percentage: Percent,
    /// `qty × price × (1 − disc) × (1 + vat)`, zero for gifts.
    pub total_price: Money,
    /// Quantity currently taken out of stock for this line.
    pub stock_applied: Quantity,
    pub comments: Option<String>,
}

// =============================================================================
// Delivery Note
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DeliveryNote {
    pub id: String,
    pub delivery_note_number: String,
    /// Cleared when the order is deleted.
    pub order_id: Option<String>,
    pub customer_id: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub status: DeliveryNoteStatus,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DeliveryNoteItem {
    pub id: String,
    pub delivery_note_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: Quantity,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub order_id: Option<String>,
    pub delivery_note_id: Option<String>,
    /// The billed customer (headquarters for branch orders).
    pub customer_id: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub subtotal: Money,
    pub discount_percentage: Percent,
    pub discount_amount: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub notes: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// `total_amount − paid_amount`. Negative after an overpayment.
    pub fn outstanding_amount(&self) -> Money {
        self.total_amount - self.paid_amount
    }

    /// Issued (not yet paid) and past its due date.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    /// assert!(invoice.is_overdue(today)); // issued, due 2025-02-28
    /// ```
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match (self.status, self.due_date) {
            (InvoiceStatus::Issued, Some(due)) => due < today,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: Quantity,
    /// Net unit price.
    pub unit_price: Money,
    pub is_gift: bool,
    pub discount_percentage: Percent,
    pub vat_percentage: Percent,
    pub vat_amount: Money,
    /// Net line value after the line discount.
    pub total_price: Money,
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    CreditCard,
    Cheque,
    Online,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub receipt_number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    /// Immutable once recorded.
    pub amount_paid: Money,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub status: PaymentStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Credit Note
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditNote {
    pub id: String,
    pub credit_note_number: String,
    pub customer_id: String,
    pub original_invoice_id: Option<String>,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub reason: Option<String>,
    pub status: CreditNoteStatus,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditNoteItem {
    pub id: String,
    pub credit_note_id: String,
    pub invoice_item_id: Option<String>,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub vat_percentage: Percent,
    /// `qty × unit_price`, before VAT.
    pub total_price: Money,
    pub vat_amount: Money,
}

// =============================================================================
// Purchase Order
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub po_number: String,
    pub supplier_id: String,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub expected_delivery_date: Option<NaiveDate>,
    pub status: PurchaseOrderStatus,
    pub total_amount: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: Quantity,
    pub quantity_received: Quantity,
    pub cost_price: Money,
    pub total_cost: Money,
}

impl PurchaseOrderItem {
    /// Ordered but not yet received.
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.quantity_received
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity_received >= self.quantity
    }
}

// =============================================================================
// Retail Receipt
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RetailReceipt {
    pub id: String,
    pub receipt_number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub issue_date: DateTime<Utc>,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
    pub status: RetailReceiptStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RetailReceiptItem {
    pub id: String,
    pub receipt_id: String,
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discount_percentage: Percent,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub final_price: Money,
}

// =============================================================================
// Commission
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Commission {
    pub id: String,
    pub sales_rep_id: String,
    /// At most one commission per invoice.
    pub invoice_id: String,
    pub calculated_amount: Money,
    #[ts(as = "String")]
    pub calculation_date: NaiveDate,
    pub status: CommissionStatus,
    #[ts(as = "Option<String>")]
    pub paid_date: Option<NaiveDate>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(status: InvoiceStatus, due: Option<NaiveDate>) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: "inv-1".to_string(),
            invoice_number: "INV-2025-0001".to_string(),
            order_id: None,
            delivery_note_id: None,
            customer_id: "cust-1".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            due_date: due,
            status,
            subtotal: Money::from_cents(10_000),
            discount_percentage: Percent::zero(),
            discount_amount: Money::zero(),
            vat_amount: Money::from_cents(2_400),
            total_amount: Money::from_cents(12_400),
            paid_amount: Money::from_cents(4_000),
            notes: None,
            shipping: ShippingDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_outstanding_amount() {
        let inv = invoice(InvoiceStatus::Issued, None);
        assert_eq!(inv.outstanding_amount(), Money::from_cents(8_400));
    }

    #[test]
    fn test_is_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 2, 28);
        let march = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();

        assert!(invoice(InvoiceStatus::Issued, due).is_overdue(march));
        assert!(!invoice(InvoiceStatus::Issued, due).is_overdue(feb));
        assert!(!invoice(InvoiceStatus::Paid, due).is_overdue(march));
        assert!(!invoice(InvoiceStatus::Issued, None).is_overdue(march));
    }

    #[test]
    fn test_purchase_order_item_remaining() {
        let item = PurchaseOrderItem {
            id: "poi".to_string(),
            purchase_order_id: "po".to_string(),
            product_id: "p".to_string(),
            quantity: Quantity::units(10),
            quantity_received: Quantity::units(4),
            cost_price: Money::from_cents(500),
            total_cost: Money::from_cents(5_000),
        };
        assert_eq!(item.remaining(), Quantity::units(6));
        assert!(!item.is_fully_received());
    }
}
