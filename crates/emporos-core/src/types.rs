//! # Reference Types
//!
//! Master data (products, customers, sales reps, suppliers), the acting
//! user, and the append-only journals.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Reference Types                                 │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Customer     │   │    SalesRep     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code (unique)  │   │  code (0001)    │   │  rep_type       │       │
//! │  │  price / vat    │   │  balance        │   │  commission_rate│       │
//! │  │  stock_quantity │   │  parent_id      │   └─────────────────┘       │
//! │  └────────┬────────┘   └────────┬────────┘                              │
//! │           │                     │                                       │
//! │           ▼                     ▼                                       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ StockMovement   │   │ BalancePosting  │   │  ActivityLog    │       │
//! │  │ (journal)       │   │ (journal)       │   │  (audit)        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every row has a `id`: UUID v7 string, time ordered. Business keys
//! (product code, customer code, document numbers) are separate columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::quantity::{Quantity, UnitOfMeasure};

/// Generates a new time-ordered row id.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

// =============================================================================
// Actor
// =============================================================================

/// The user performing an operation.
///
/// Passed explicitly into every ledger operation and written to the
/// audit log; never looked up from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor for maintenance tasks such as seeding.
    pub fn system() -> Self {
        Actor::new("system", "system")
    }
}

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub code: String,
    pub name: String,
    pub unit_of_measurement: UnitOfMeasure,
    /// Net selling price.
    pub price: Money,
    pub cost_price: Money,
    pub vat_percentage: Percent,
    /// On-hand quantity. Only ever changed through a stock movement.
    pub stock_quantity: Quantity,
    pub min_stock_level: Quantity,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when on-hand stock is at or below the reorder level.
    pub fn is_low_on_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Positive means the customer owes money.
    pub balance: Money,
    pub credit_limit: Money,
    /// Headquarters account for branch billing.
    pub parent_id: Option<String>,
    pub is_branch: bool,
    /// Branches that only receive delivery notes have this off.
    pub can_be_invoiced: bool,
    pub sales_rep_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Company name when present, otherwise "First Last".
    pub fn display_name(&self) -> String {
        match &self.company_name {
            Some(company) if !company.trim().is_empty() => company.clone(),
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

// =============================================================================
// Sales Representative
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum RepType {
    /// In-house salesperson.
    Sales,
    /// External agent.
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesRep {
    pub id: String,
    pub name: String,
    pub rep_type: RepType,
    pub commission_rate: Percent,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Supplier
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub vat_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shipping
// =============================================================================

/// Why goods are moving (printed on delivery documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Purpose {
    Sale,
    Sample,
    Repair,
    Return,
    Internal,
    Other,
}

impl Default for Purpose {
    fn default() -> Self {
        Purpose::Sale
    }
}

/// Shipping block shared by orders, delivery notes and invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShippingDetails {
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_vat_number: Option<String>,
    pub purpose: Option<Purpose>,
    pub carrier: Option<String>,
    pub license_plate: Option<String>,
}

// =============================================================================
// Stock Receipt
// =============================================================================

/// One stock-increase event. Creating, editing or deleting it moves stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockReceipt {
    pub id: String,
    pub product_id: String,
    pub quantity_added: Quantity,
    #[ts(as = "String")]
    pub date_received: DateTime<Utc>,
    pub purchase_order_item_id: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: String,
}

// =============================================================================
// Journals
// =============================================================================

/// Why a product's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    OpeningBalance,
    Adjustment,
    OrderLine,
    OrderCancelled,
    OrderDeleted,
    StockReceipt,
    StockReceiptEdited,
    StockReceiptDeleted,
    CreditNoteReturn,
    RetailSale,
    RetailReceiptDeleted,
}

/// One row of the stock journal.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub delta: Quantity,
    pub reason: StockReason,
    /// Document number or row id that caused the movement.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What moved a customer balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    InvoiceIssued,
    InvoiceCancelled,
    PaymentRecorded,
    PaymentCancelled,
    CreditNoteIssued,
}

impl PostingKind {
    /// +1 for debits (customer owes more), −1 for credits.
    pub const fn sign(&self) -> i64 {
        match self {
            PostingKind::InvoiceIssued | PostingKind::PaymentCancelled => 1,
            PostingKind::InvoiceCancelled
            | PostingKind::PaymentRecorded
            | PostingKind::CreditNoteIssued => -1,
        }
    }
}

/// One row of the balance journal.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BalancePosting {
    pub id: String,
    pub customer_id: String,
    /// Signed: positive debits, negative credits.
    pub amount: Money,
    pub kind: PostingKind,
    pub reference: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Activity Log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    StatusChange,
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ActivityLog {
    pub id: String,
    pub actor_id: String,
    pub actor_name: String,
    #[ts(as = "String")]
    pub action_time: DateTime<Utc>,
    pub action_kind: ActionKind,
    /// Entity name such as `Invoice`; empty for session events.
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    /// Human-readable subject, usually the document number.
    pub subject_repr: String,
    pub details: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_v7() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(uuid::Uuid::parse_str(&a).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_posting_signs() {
        assert_eq!(PostingKind::InvoiceIssued.sign(), 1);
        assert_eq!(PostingKind::PaymentRecorded.sign(), -1);
        assert_eq!(PostingKind::PaymentCancelled.sign(), 1);
        assert_eq!(PostingKind::CreditNoteIssued.sign(), -1);
    }

    #[test]
    fn test_action_kind_spelling() {
        assert_eq!(
            serde_json::to_string(&ActionKind::StatusChange).unwrap(),
            "\"STATUS_CHANGE\""
        );
        assert_eq!(serde_json::to_string(&RepType::Agent).unwrap(), "\"AGENT\"");
    }
}
