//! # Document Statuses
//!
//! Every document kind has a status vocabulary and a transition table.
//! The vocabularies are persisted verbatim, so their spelling (including
//! case) is part of the storage contract:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ Order            │ pending  processing  completed  cancelled            │
//! │ Invoice          │ draft  issued  paid  cancelled  credited             │
//! │ Payment          │ active  cancelled                                    │
//! │ DeliveryNote     │ PREPARING  SHIPPED  DELIVERED  CANCELLED             │
//! │ CreditNote       │ DRAFT  ISSUED  APPLIED                               │
//! │ PurchaseOrder    │ DRAFT  ORDERED  PARTIALLY_RECEIVED  COMPLETED        │
//! │                  │ CANCELLED                                            │
//! │ Commission       │ UNPAID  PAID                                         │
//! │ RetailReceipt    │ ISSUED  CANCELLED                                    │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order state machine
//! ```text
//!   pending ──► processing ──► completed
//!      │  └────────────────────────▲  │
//!      │             │                │
//!      └─────────────┴──► cancelled ◄─┘
//! ```
//!
//! ## Invoice state machine
//! ```text
//!   draft ──► issued ──► paid ──► credited
//!               │  └──────────────────▲
//!               └──► cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Lifecycle Trait
// =============================================================================

/// A status enum with a fixed transition table.
pub trait Lifecycle: Copy + PartialEq + fmt::Debug {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// The persisted spelling of this status.
    fn as_str(&self) -> &'static str;

    /// Whether `self → next` is a legal move.
    fn allows(&self, next: Self) -> bool;

    /// Validates `self → next`, returning `next` on success.
    ///
    /// ## Example
    /// ```rust
    /// use emporos_core::status::{Lifecycle, OrderStatus};
    ///
    /// assert!(OrderStatus::Pending.transition_to(OrderStatus::Completed).is_ok());
    /// assert!(OrderStatus::Cancelled.transition_to(OrderStatus::Cancelled).is_err());
    /// ```
    fn transition_to(self, next: Self) -> CoreResult<Self> {
        if self.allows(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

macro_rules! impl_display_via_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl Lifecycle for OrderStatus {
    const ENTITY: &'static str = "Order";

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Forward moves only; any live order may be cancelled.
    fn allows(&self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Processing, Completed)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Completed, Cancelled)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
    Credited,
}

impl InvoiceStatus {
    /// Statuses whose total is carried in the customer balance.
    pub const POSTED: [InvoiceStatus; 3] = [
        InvoiceStatus::Issued,
        InvoiceStatus::Paid,
        InvoiceStatus::Credited,
    ];

    /// True when the invoice total has been posted to the balance.
    pub fn is_posted(&self) -> bool {
        Self::POSTED.contains(self)
    }

    /// Credit notes may be raised against issued or paid invoices.
    pub fn is_creditable(&self) -> bool {
        matches!(self, InvoiceStatus::Issued | InvoiceStatus::Paid)
    }
}

impl Lifecycle for InvoiceStatus {
    const ENTITY: &'static str = "Invoice";

    fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Credited => "credited",
        }
    }

    fn allows(&self, next: Self) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Issued)
                | (Issued, Paid)
                | (Issued, Cancelled)
                | (Issued, Credited)
                | (Paid, Credited)
        )
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Active,
    Cancelled,
}

impl Lifecycle for PaymentStatus {
    const ENTITY: &'static str = "Payment";

    fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Active => "active",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    fn allows(&self, next: Self) -> bool {
        matches!((self, next), (PaymentStatus::Active, PaymentStatus::Cancelled))
    }
}

// =============================================================================
// Delivery Note Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryNoteStatus {
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl DeliveryNoteStatus {
    /// Every status except cancelled counts as an active note.
    pub const ACTIVE: [DeliveryNoteStatus; 3] = [
        DeliveryNoteStatus::Preparing,
        DeliveryNoteStatus::Shipped,
        DeliveryNoteStatus::Delivered,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl Lifecycle for DeliveryNoteStatus {
    const ENTITY: &'static str = "DeliveryNote";

    fn as_str(&self) -> &'static str {
        match self {
            DeliveryNoteStatus::Preparing => "PREPARING",
            DeliveryNoteStatus::Shipped => "SHIPPED",
            DeliveryNoteStatus::Delivered => "DELIVERED",
            DeliveryNoteStatus::Cancelled => "CANCELLED",
        }
    }

    fn allows(&self, next: Self) -> bool {
        use DeliveryNoteStatus::*;
        matches!(
            (self, next),
            (Preparing, Shipped) | (Shipped, Delivered) | (Preparing, Cancelled) | (Shipped, Cancelled)
        )
    }
}

// =============================================================================
// Credit Note Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CreditNoteStatus {
    Draft,
    Issued,
    /// Reserved; nothing moves a credit note here yet.
    Applied,
}

impl Lifecycle for CreditNoteStatus {
    const ENTITY: &'static str = "CreditNote";

    fn as_str(&self) -> &'static str {
        match self {
            CreditNoteStatus::Draft => "DRAFT",
            CreditNoteStatus::Issued => "ISSUED",
            CreditNoteStatus::Applied => "APPLIED",
        }
    }

    fn allows(&self, next: Self) -> bool {
        use CreditNoteStatus::*;
        matches!((self, next), (Draft, Issued) | (Issued, Applied))
    }
}

// =============================================================================
// Purchase Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    PartiallyReceived,
    Completed,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Receiving is allowed until the order is closed.
    pub fn accepts_receipts(&self) -> bool {
        !matches!(
            self,
            PurchaseOrderStatus::Completed | PurchaseOrderStatus::Cancelled
        )
    }

    /// Status derived from the received quantities of all lines.
    ///
    /// ```text
    /// all lines fully received ──► COMPLETED
    /// something received       ──► PARTIALLY_RECEIVED
    /// nothing received         ──► ORDERED
    /// ```
    pub fn from_progress(all_received: bool, any_received: bool) -> Self {
        if all_received {
            PurchaseOrderStatus::Completed
        } else if any_received {
            PurchaseOrderStatus::PartiallyReceived
        } else {
            PurchaseOrderStatus::Ordered
        }
    }
}

impl Lifecycle for PurchaseOrderStatus {
    const ENTITY: &'static str = "PurchaseOrder";

    fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Ordered => "ORDERED",
            PurchaseOrderStatus::PartiallyReceived => "PARTIALLY_RECEIVED",
            PurchaseOrderStatus::Completed => "COMPLETED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    fn allows(&self, next: Self) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Ordered)
                | (Draft, PartiallyReceived)
                | (Draft, Completed)
                | (Ordered, PartiallyReceived)
                | (Ordered, Completed)
                | (PartiallyReceived, PartiallyReceived)
                | (PartiallyReceived, Completed)
                | (Draft, Cancelled)
                | (Ordered, Cancelled)
                | (PartiallyReceived, Cancelled)
        )
    }
}

// =============================================================================
// Commission / Retail Receipt Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommissionStatus {
    Unpaid,
    Paid,
}

impl Lifecycle for CommissionStatus {
    const ENTITY: &'static str = "Commission";

    fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Unpaid => "UNPAID",
            CommissionStatus::Paid => "PAID",
        }
    }

    fn allows(&self, next: Self) -> bool {
        matches!((self, next), (CommissionStatus::Unpaid, CommissionStatus::Paid))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetailReceiptStatus {
    Issued,
    Cancelled,
}

impl RetailReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetailReceiptStatus::Issued => "ISSUED",
            RetailReceiptStatus::Cancelled => "CANCELLED",
        }
    }
}

impl_display_via_as_str!(
    OrderStatus,
    InvoiceStatus,
    PaymentStatus,
    DeliveryNoteStatus,
    CreditNoteStatus,
    PurchaseOrderStatus,
    CommissionStatus,
    RetailReceiptStatus,
);

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_moves_forward_only() {
        assert!(OrderStatus::Pending.allows(OrderStatus::Processing));
        assert!(OrderStatus::Processing.allows(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.allows(OrderStatus::Pending));
        assert!(!OrderStatus::Processing.allows(OrderStatus::Pending));
        assert!(OrderStatus::Completed.allows(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.allows(OrderStatus::Cancelled));
    }

    #[test]
    fn test_invoice_transitions() {
        assert!(InvoiceStatus::Draft.allows(InvoiceStatus::Issued));
        assert!(InvoiceStatus::Issued.allows(InvoiceStatus::Cancelled));
        assert!(!InvoiceStatus::Draft.allows(InvoiceStatus::Cancelled));
        assert!(!InvoiceStatus::Paid.allows(InvoiceStatus::Cancelled));
        assert!(InvoiceStatus::Paid.allows(InvoiceStatus::Credited));
        assert!(!InvoiceStatus::Cancelled.allows(InvoiceStatus::Issued));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = PaymentStatus::Cancelled
            .transition_to(PaymentStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "Payment cannot move from cancelled to cancelled");
    }

    #[test]
    fn test_persisted_spelling() {
        assert_eq!(DeliveryNoteStatus::Preparing.to_string(), "PREPARING");
        assert_eq!(
            PurchaseOrderStatus::PartiallyReceived.to_string(),
            "PARTIALLY_RECEIVED"
        );
        assert_eq!(InvoiceStatus::Credited.to_string(), "credited");
        assert_eq!(
            serde_json::to_string(&PurchaseOrderStatus::PartiallyReceived).unwrap(),
            "\"PARTIALLY_RECEIVED\""
        );
        assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), "\"pending\"");
    }

    #[test]
    fn test_purchase_order_progress() {
        assert_eq!(
            PurchaseOrderStatus::from_progress(true, true),
            PurchaseOrderStatus::Completed
        );
        assert_eq!(
            PurchaseOrderStatus::from_progress(false, true),
            PurchaseOrderStatus::PartiallyReceived
        );
        assert_eq!(
            PurchaseOrderStatus::from_progress(false, false),
            PurchaseOrderStatus::Ordered
        );
        assert!(!PurchaseOrderStatus::Cancelled.accepts_receipts());
    }

    #[test]
    fn test_posted_invoices() {
        assert!(InvoiceStatus::Issued.is_posted());
        assert!(InvoiceStatus::Credited.is_posted());
        assert!(!InvoiceStatus::Draft.is_posted());
        assert!(!InvoiceStatus::Cancelled.is_posted());
    }
}
