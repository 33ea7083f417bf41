//! # Payment Allocation Planning
//!
//! Decides how a payment is applied to newly linked invoices. The ledger
//! crate reads the invoices under lock, asks this module for a plan, and
//! writes the plan back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment 100.00 linked to:                                             │
//! │                                                                         │
//! │   INV-0003 (2025-01-05) due  80.00 ──► apply  80.00 ──► paid           │
//! │   INV-0007 (2025-01-09) due 150.00 ──► apply 100.00 ──► still issued   │
//! │   INV-0009 (2025-01-12) due   0.00 ──► skipped                         │
//! │                                                                         │
//! │  Each invoice is offered the FULL payment amount, capped at its due.  │
//! │  The payment is not drawn down across invoices.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The second row is the long-standing behaviour: a payment linked to
//! several invoices can settle more than its own amount. Callers that need
//! a shared pool must split the payment before linking.

use chrono::NaiveDate;

use crate::money::Money;

/// An invoice as seen by the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTarget {
    pub invoice_id: String,
    pub issue_date: NaiveDate,
    pub total_amount: Money,
    pub paid_amount: Money,
}

/// What to write back for one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationStep {
    pub invoice_id: String,
    pub applied: Money,
    pub new_paid_amount: Money,
    /// Outstanding is now ≤ 0, so the invoice becomes paid.
    pub settles: bool,
}

/// Plans the allocation of `payment_amount` over `targets`.
///
/// Targets are processed in ascending `(issue_date, invoice_id)` order.
/// Invoices with nothing due produce no step.
pub fn plan_allocation(payment_amount: Money, mut targets: Vec<AllocationTarget>) -> Vec<AllocationStep> {
    targets.sort_by(|a, b| {
        a.issue_date
            .cmp(&b.issue_date)
            .then_with(|| a.invoice_id.cmp(&b.invoice_id))
    });

    targets
        .into_iter()
        .filter_map(|target| {
            let due = target.total_amount - target.paid_amount;
            if !due.is_positive() {
                return None;
            }

            let applied = payment_amount.min(due);
            let new_paid_amount = target.paid_amount + applied;

            Some(AllocationStep {
                invoice_id: target.invoice_id,
                applied,
                new_paid_amount,
                settles: !(target.total_amount - new_paid_amount).is_positive(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, day: u32, total: i64, paid: i64) -> AllocationTarget {
        AllocationTarget {
            invoice_id: id.to_string(),
            issue_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            total_amount: Money::from_cents(total),
            paid_amount: Money::from_cents(paid),
        }
    }

    #[test]
    fn test_single_invoice_fully_paid() {
        let steps = plan_allocation(Money::from_cents(12_400), vec![target("a", 1, 12_400, 0)]);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].applied, Money::from_cents(12_400));
        assert!(steps[0].settles);
    }

    #[test]
    fn test_partial_payment_does_not_settle() {
        let steps = plan_allocation(Money::from_cents(5_000), vec![target("a", 1, 12_400, 0)]);
        assert_eq!(steps[0].new_paid_amount, Money::from_cents(5_000));
        assert!(!steps[0].settles);
    }

    #[test]
    fn test_full_amount_offered_to_each_invoice() {
        let steps = plan_allocation(
            Money::from_cents(10_000),
            vec![target("late", 9, 15_000, 0), target("early", 5, 8_000, 0)],
        );

        assert_eq!(steps[0].invoice_id, "early");
        assert_eq!(steps[0].applied, Money::from_cents(8_000));
        assert!(steps[0].settles);

        assert_eq!(steps[1].invoice_id, "late");
        assert_eq!(steps[1].applied, Money::from_cents(10_000));
        assert!(!steps[1].settles);
    }

    #[test]
    fn test_nothing_due_is_skipped() {
        let steps = plan_allocation(
            Money::from_cents(1_000),
            vec![target("done", 1, 5_000, 5_000), target("open", 2, 500, 0)],
        );
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].invoice_id, "open");
        assert_eq!(steps[0].applied, Money::from_cents(500));
    }

    #[test]
    fn test_same_day_ordered_by_id() {
        let steps = plan_allocation(
            Money::from_cents(100),
            vec![target("b", 3, 100, 0), target("a", 3, 100, 0)],
        );
        assert_eq!(steps[0].invoice_id, "a");
        assert_eq!(steps[1].invoice_id, "b");
    }
}
