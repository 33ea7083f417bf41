//! # Document Numbers
//!
//! Human-readable numbers are `{PREFIX}-{YEAR}-{SEQUENCE}` with a
//! kind-specific zero padding. The year comes from the document's own
//! date, so the sequence restarts every calendar year.
//!
//! ```text
//! ┌──────────────────┬─────────┬─────────┬──────────────────────┐
//! │ Kind             │ Prefix  │ Padding │ Example              │
//! ├──────────────────┼─────────┼─────────┼──────────────────────┤
//! │ Order            │ ORDER   │ 4       │ ORDER-2025-0007      │
//! │ Invoice          │ INV     │ 4       │ INV-2025-0012        │
//! │ Payment          │ PAY     │ 4       │ PAY-2025-0003        │
//! │ CreditNote       │ CN      │ 4       │ CN-2025-0001         │
//! │ DeliveryNote     │ DN      │ 5       │ DN-2025-00042        │
//! │ PurchaseOrder    │ PO      │ 5       │ PO-2025-00001        │
//! │ RetailReceipt    │ RETAIL  │ 5       │ RETAIL-2025-00310    │
//! └──────────────────┴─────────┴─────────┴──────────────────────┘
//! ```
//!
//! Customer codes are a plain 4-digit sequence (`0001`) with no year.
//!
//! This module only formats and parses. Allocation (counter table,
//! uniqueness retry) lives in the ledger crate.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Counter key used for customer codes.
pub const CUSTOMER_COUNTER_PREFIX: &str = "CUSTOMER";

/// Width of generated customer codes.
pub const CUSTOMER_CODE_WIDTH: usize = 4;

/// A numbered document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Order,
    Invoice,
    Payment,
    CreditNote,
    DeliveryNote,
    PurchaseOrder,
    RetailReceipt,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 7] = [
        DocumentKind::Order,
        DocumentKind::Invoice,
        DocumentKind::Payment,
        DocumentKind::CreditNote,
        DocumentKind::DeliveryNote,
        DocumentKind::PurchaseOrder,
        DocumentKind::RetailReceipt,
    ];

    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Order => "ORDER",
            DocumentKind::Invoice => "INV",
            DocumentKind::Payment => "PAY",
            DocumentKind::CreditNote => "CN",
            DocumentKind::DeliveryNote => "DN",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::RetailReceipt => "RETAIL",
        }
    }

    /// Zero padding of the sequence part.
    pub const fn padding(&self) -> usize {
        match self {
            DocumentKind::Order
            | DocumentKind::Invoice
            | DocumentKind::Payment
            | DocumentKind::CreditNote => 4,
            DocumentKind::DeliveryNote
            | DocumentKind::PurchaseOrder
            | DocumentKind::RetailReceipt => 5,
        }
    }

    /// Table and column holding this kind's numbers.
    pub const fn storage(&self) -> (&'static str, &'static str) {
        match self {
            DocumentKind::Order => ("orders", "order_number"),
            DocumentKind::Invoice => ("invoices", "invoice_number"),
            DocumentKind::Payment => ("payments", "receipt_number"),
            DocumentKind::CreditNote => ("credit_notes", "credit_note_number"),
            DocumentKind::DeliveryNote => ("delivery_notes", "delivery_note_number"),
            DocumentKind::PurchaseOrder => ("purchase_orders", "po_number"),
            DocumentKind::RetailReceipt => ("retail_receipts", "receipt_number"),
        }
    }

    /// `"INV-2025-"`, the prefix every number of that year starts with.
    pub fn year_prefix(&self, year: i32) -> String {
        format!("{}-{}-", self.prefix(), year)
    }

    /// Formats a document number.
    ///
    /// ## Example
    /// ```rust
    /// use emporos_core::numbering::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::Invoice.format(2025, 12), "INV-2025-0012");
    /// assert_eq!(DocumentKind::DeliveryNote.format(2025, 42), "DN-2025-00042");
    /// ```
    pub fn format(&self, year: i32, sequence: u32) -> String {
        format!(
            "{}{:0width$}",
            self.year_prefix(year),
            sequence,
            width = self.padding()
        )
    }

    /// Extracts the sequence from a number of this kind and year.
    ///
    /// Returns `None` for a different prefix or year, or a suffix that is
    /// not a number. Sequences wider than the padding still parse, so a
    /// year that overflows `9999` keeps counting.
    pub fn parse_sequence(&self, year: i32, number: &str) -> Option<u32> {
        number
            .strip_prefix(&self.year_prefix(year))
            .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            .and_then(|rest| rest.parse().ok())
    }
}

/// Formats a generated customer code (`0001`).
pub fn format_customer_code(sequence: u32) -> String {
    format!("{:0width$}", sequence, width = CUSTOMER_CODE_WIDTH)
}

/// Parses a purely numeric customer code.
pub fn parse_customer_code(code: &str) -> Option<u32> {
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
        code.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_padding() {
        assert_eq!(DocumentKind::Order.format(2025, 1), "ORDER-2025-0001");
        assert_eq!(DocumentKind::Payment.format(2024, 37), "PAY-2024-0037");
        assert_eq!(DocumentKind::CreditNote.format(2025, 9), "CN-2025-0009");
        assert_eq!(DocumentKind::PurchaseOrder.format(2025, 1), "PO-2025-00001");
        assert_eq!(DocumentKind::RetailReceipt.format(2025, 310), "RETAIL-2025-00310");
        assert_eq!(DocumentKind::Order.format(2025, 12345), "ORDER-2025-12345");
    }

    #[test]
    fn test_parse_sequence() {
        let kind = DocumentKind::Invoice;
        assert_eq!(kind.parse_sequence(2025, "INV-2025-0012"), Some(12));
        assert_eq!(kind.parse_sequence(2025, "INV-2024-0012"), None);
        assert_eq!(kind.parse_sequence(2025, "PAY-2025-0012"), None);
        assert_eq!(kind.parse_sequence(2025, "INV-2025-12a"), None);
        assert_eq!(kind.parse_sequence(2025, "INV-2025-"), None);
    }

    #[test]
    fn test_format_then_parse_each_kind() {
        for kind in DocumentKind::ALL {
            let number = kind.format(2026, 77);
            assert_eq!(kind.parse_sequence(2026, &number), Some(77), "{}", number);
        }
    }

    #[test]
    fn test_customer_codes() {
        assert_eq!(format_customer_code(1), "0001");
        assert_eq!(parse_customer_code("0042"), Some(42));
        assert_eq!(parse_customer_code("RETAIL"), None);
        assert_eq!(parse_customer_code(""), None);
    }
}
