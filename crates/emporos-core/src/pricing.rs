//! # Pricing
//!
//! Line and document arithmetic for every document kind.
//!
//! ## Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity  : hundredths      (Quantity)      5 pcs   = 500              │
//! │  price     : cents           (Money)         100.00  = 10_000           │
//! │  percent   : basis points    (Percent)       24%     = 2_400            │
//! │                                                                         │
//! │  qty × price                 = 500 × 10_000            / 100            │
//! │  × (1 − disc) × (1 + vat)    = × (10_000 − d) × (10_000 + v) / 10_000²  │
//! │                                                                         │
//! │  Everything is multiplied out in i128 and divided ONCE at the end,     │
//! │  rounding half to even.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Document totals
//! Document totals are sums of the already rounded line amounts, so a
//! printed document always adds up line by line.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent, BPS_SCALE};
use crate::quantity::{Quantity, QTY_SCALE};

/// `qty × price` in cents, scaled by [`QTY_SCALE`].
#[inline]
fn gross(quantity: Quantity, unit_price: Money) -> i128 {
    quantity.hundredths() as i128 * unit_price.cents() as i128
}

// =============================================================================
// Order Lines
// =============================================================================

/// Resolved pricing of an order line before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLinePrice {
    pub unit_price: Money,
    pub discount: Percent,
    pub vat: Percent,
    pub total: Money,
}

/// Prices an order line (VAT included).
///
/// ## Rules
/// - Gift lines are zero-priced: unit price and discount are forced to 0.
/// - A non-gift product line entered with a zero (or absent) unit price
///   takes the product's current price and VAT.
///
/// ## Example
/// ```rust
/// use emporos_core::money::{Money, Percent};
/// use emporos_core::pricing::price_order_line;
/// use emporos_core::quantity::Quantity;
///
/// // 5 × 100.00 × 1.24 = 620.00
/// let line = price_order_line(
///     Quantity::units(5),
///     None,
///     Percent::zero(),
///     Percent::whole(24),
///     false,
///     Some((Money::from_cents(10_000), Percent::whole(24))),
/// );
/// assert_eq!(line.total.cents(), 62_000);
/// ```
pub fn price_order_line(
    quantity: Quantity,
    unit_price: Option<Money>,
    discount: Percent,
    vat: Percent,
    is_gift: bool,
    product_price: Option<(Money, Percent)>,
) -> OrderLinePrice {
    let (unit_price, discount, vat) = if is_gift {
        (Money::zero(), Percent::zero(), vat)
    } else {
        match (unit_price, product_price) {
            (Some(price), _) if !price.is_zero() => (price, discount, vat),
            (_, Some((price, product_vat))) => (price, discount, product_vat),
            (price, None) => (price.unwrap_or_default(), discount, vat),
        }
    };

    let total = Money::from_exact(
        gross(quantity, unit_price)
            * discount.complement_bps()
            * (BPS_SCALE + vat.bps() as i128),
        QTY_SCALE as i128 * BPS_SCALE * BPS_SCALE,
    );

    OrderLinePrice {
        unit_price,
        discount,
        vat,
        total,
    }
}

// =============================================================================
// Net Lines (invoice / credit note / retail)
// =============================================================================

/// Net value and VAT of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineAmounts {
    /// Net value after the line discount.
    pub subtotal: Money,
    pub vat: Money,
}

/// Invoice line: `subtotal = qty × price × (1 − disc)`, `vat = subtotal × vat`.
///
/// VAT is taken from the exact subtotal, not the rounded one.
pub fn invoice_line(
    quantity: Quantity,
    unit_price: Money,
    discount: Percent,
    vat: Percent,
) -> LineAmounts {
    let net = gross(quantity, unit_price) * discount.complement_bps();
    let net_scale = QTY_SCALE as i128 * BPS_SCALE;

    LineAmounts {
        subtotal: Money::from_exact(net, net_scale),
        vat: Money::from_exact(net * vat.bps() as i128, net_scale * BPS_SCALE),
    }
}

/// Credit note line: `total = qty × unit_price`, `vat = total × vat`.
///
/// Line discounts of the original invoice line are not carried over.
pub fn credit_note_line(quantity: Quantity, unit_price: Money, vat: Percent) -> LineAmounts {
    invoice_line(quantity, unit_price, Percent::zero(), vat)
}

/// Retail line amounts; `final_price` is VAT inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetailLineAmounts {
    pub subtotal: Money,
    pub vat: Money,
    pub final_price: Money,
}

/// Retail line: net after discount, VAT on top, final = net + VAT.
pub fn retail_line(
    quantity: Quantity,
    unit_price: Money,
    discount: Percent,
    vat: Percent,
) -> RetailLineAmounts {
    let LineAmounts { subtotal, vat } = invoice_line(quantity, unit_price, discount, vat);
    RetailLineAmounts {
        subtotal,
        vat,
        final_price: subtotal + vat,
    }
}

// =============================================================================
// Document Totals
// =============================================================================

/// Totals of a document without a document-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
}

/// Sums rounded lines (credit notes, retail receipts).
pub fn sum_lines<'a, I>(lines: I) -> DocumentTotals
where
    I: IntoIterator<Item = &'a LineAmounts>,
{
    let (subtotal, vat_amount) = lines
        .into_iter()
        .fold((Money::zero(), Money::zero()), |(s, v), line| {
            (s + line.subtotal, v + line.vat)
        });

    DocumentTotals {
        subtotal,
        vat_amount,
        total_amount: subtotal + vat_amount,
    }
}

/// Invoice totals after a document-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub vat_amount: Money,
    pub total_amount: Money,
}

/// Computes invoice totals from its lines.
///
/// ```text
/// subtotal        = Σ line subtotal
/// discount_amount = subtotal × disc
/// vat_amount      = Σ line vat × (1 − disc)
/// total_amount    = subtotal − discount_amount + vat_amount
/// ```
pub fn invoice_totals<'a, I>(lines: I, discount: Percent) -> InvoiceTotals
where
    I: IntoIterator<Item = &'a LineAmounts>,
{
    let DocumentTotals {
        subtotal,
        vat_amount: line_vat,
        ..
    } = sum_lines(lines);

    let discount_amount = subtotal.percent_of(discount);
    let vat_amount = Money::from_exact(
        line_vat.cents() as i128 * discount.complement_bps(),
        BPS_SCALE,
    );

    InvoiceTotals {
        subtotal,
        discount_amount,
        vat_amount,
        total_amount: subtotal - discount_amount + vat_amount,
    }
}

// =============================================================================
// Purchasing / Commission
// =============================================================================

/// Purchase order line cost: `qty × cost_price`.
pub fn purchase_line_cost(quantity: Quantity, cost_price: Money) -> Money {
    Money::from_exact(gross(quantity, cost_price), QTY_SCALE as i128)
}

/// Commission on an invoice: `subtotal × rate`.
pub fn commission_amount(invoice_subtotal: Money, rate: Percent) -> Money {
    invoice_subtotal.percent_of(rate)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn eur(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_order_line_with_vat() {
        let line = price_order_line(
            Quantity::units(5),
            Some(eur(10_000)),
            Percent::zero(),
            Percent::whole(24),
            false,
            None,
        );
        assert_eq!(line.total, eur(62_000));
    }

    #[test]
    fn test_order_line_discount_and_fraction() {
        // 2.5 kg × 3.99 × 0.9 × 1.13 = 10.1446... → 10.14
        let line = price_order_line(
            Quantity::from_hundredths(250),
            Some(eur(399)),
            Percent::whole(10),
            Percent::whole(13),
            false,
            None,
        );
        assert_eq!(line.total, eur(1_014));
    }

    #[test]
    fn test_order_line_gift_is_free() {
        let line = price_order_line(
            Quantity::units(2),
            Some(eur(5_000)),
            Percent::whole(10),
            Percent::whole(24),
            true,
            Some((eur(5_000), Percent::whole(24))),
        );
        assert_eq!(line.total, Money::zero());
        assert_eq!(line.unit_price, Money::zero());
        assert_eq!(line.discount, Percent::zero());
    }

    #[test]
    fn test_order_line_takes_product_price_when_zero() {
        let line = price_order_line(
            Quantity::units(1),
            Some(Money::zero()),
            Percent::zero(),
            Percent::whole(24),
            false,
            Some((eur(2_000), Percent::whole(13))),
        );
        assert_eq!(line.unit_price, eur(2_000));
        assert_eq!(line.vat, Percent::whole(13));
        assert_eq!(line.total, eur(2_260));
    }

    #[test]
    fn test_invoice_line_vat_from_exact_subtotal() {
        // 3 × 0.35 × 0.95 = 0.9975 → 1.00 ; vat 0.9975 × 24% = 0.2394 → 0.24
        let line = invoice_line(Quantity::units(3), eur(35), Percent::whole(5), Percent::whole(24));
        assert_eq!(line.subtotal, eur(100));
        assert_eq!(line.vat, eur(24));
    }

    #[test]
    fn test_invoice_totals_with_discount() {
        let lines = [
            invoice_line(Quantity::units(2), eur(5_000), Percent::zero(), Percent::whole(24)),
            invoice_line(Quantity::units(1), eur(2_000), Percent::zero(), Percent::whole(13)),
        ];
        let totals = invoice_totals(&lines, Percent::whole(10));

        assert_eq!(totals.subtotal, eur(12_000));
        assert_eq!(totals.discount_amount, eur(1_200));
        // (2400 + 260) × 0.9 = 2394
        assert_eq!(totals.vat_amount, eur(2_394));
        assert_eq!(totals.total_amount, eur(13_194));
    }

    #[test]
    fn test_invoice_totals_without_discount() {
        let lines = [invoice_line(
            Quantity::units(1),
            eur(10_000),
            Percent::zero(),
            Percent::whole(24),
        )];
        let totals = invoice_totals(&lines, Percent::zero());
        assert_eq!(totals.total_amount, eur(12_400));
        assert_eq!(totals.discount_amount, Money::zero());
    }

    #[test]
    fn test_credit_note_and_retail_lines() {
        let cn = credit_note_line(Quantity::units(3), eur(10_000), Percent::whole(24));
        assert_eq!(cn.subtotal, eur(30_000));
        assert_eq!(cn.vat, eur(7_200));

        let retail = retail_line(Quantity::units(2), eur(1_000), Percent::whole(50), Percent::whole(24));
        assert_eq!(retail.subtotal, eur(1_000));
        assert_eq!(retail.vat, eur(240));
        assert_eq!(retail.final_price, eur(1_240));
    }

    #[test]
    fn test_sum_lines() {
        let lines = [
            LineAmounts { subtotal: eur(100), vat: eur(24) },
            LineAmounts { subtotal: eur(50), vat: eur(12) },
        ];
        let totals = sum_lines(&lines);
        assert_eq!(totals.subtotal, eur(150));
        assert_eq!(totals.vat_amount, eur(36));
        assert_eq!(totals.total_amount, eur(186));
    }

    #[test]
    fn test_purchase_and_commission() {
        assert_eq!(purchase_line_cost(Quantity::from_hundredths(150), eur(1_000)), eur(1_500));
        assert_eq!(commission_amount(eur(10_000), Percent::from_bps(550)), eur(550));
    }
}
