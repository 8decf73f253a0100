//! # Payment Completion
//!
//! Makes the payment rows of a draft invoice cover its payable total, so a
//! POS invoice can be submitted as Paid.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = rounded_total or grand_total                                   │
//! │                                                                         │
//! │  total == 0 or Σ rows ≥ total ──────────────────────► unchanged         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rows empty? ──yes──► profile default rows (every method + account)    │
//! │       │                    │ failed/empty: SkippedStep                  │
//! │       │                    ▼                                            │
//! │       │               one row from the first profile method            │
//! │       │                    │ failed: SkippedStep                        │
//! │       ▼                    ▼                                            │
//! │  rows present ──► first row absorbs the shortfall, paid_amount = total │
//! │  no rows      ──► SkippedStep, invoice stays short (submit will fail)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row sources need the document store, so the caller loads them only when
//! [`needs_sources`] says so and hands them in as [`PaymentSources`].

use crate::money::Money;
use crate::types::{PaymentRow, SkippedStep};

/// Step names reported in [`SkippedStep`].
pub const STEP_PROFILE_ROWS: &str = "profile_payment_rows";
pub const STEP_FALLBACK_ROW: &str = "fallback_payment_row";
pub const STEP_COMPLETION: &str = "payment_completion";

/// Candidate rows loaded from the invoice's POS profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSources {
    /// Every profile payment method with its company account.
    pub profile_defaults: Result<Vec<PaymentRow>, String>,
    /// The first profile payment method, account resolved best-effort.
    pub first_method: Result<PaymentRow, String>,
}

impl PaymentSources {
    /// Sources for an invoice without a usable profile.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        PaymentSources {
            profile_defaults: Err(reason.clone()),
            first_method: Err(reason),
        }
    }
}

/// Result of [`complete_payments`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCompletion {
    pub payments: Vec<PaymentRow>,
    /// Set when the rows were topped up to the total.
    pub paid_amount: Option<Money>,
    pub skipped: Vec<SkippedStep>,
}

/// Amount still missing from the rows, or `None` when nothing is owed.
///
/// Rows too large to sum already cover any total.
pub fn shortfall(total: Money, rows: &[PaymentRow]) -> Option<Money> {
    if !total.is_positive() {
        return None;
    }
    let paid = Money::checked_sum(rows.iter().map(|row| row.amount))?;
    if paid < total {
        total.checked_sub(paid)
    } else {
        None
    }
}

/// Whether [`complete_payments`] will want profile rows.
pub fn needs_sources(total: Money, rows: &[PaymentRow]) -> bool {
    rows.is_empty() && shortfall(total, rows).is_some()
}

/// Completes payment rows against the payable total.
///
/// ## Example
/// ```rust
/// use tillpoint_core::payment::complete_payments;
/// use tillpoint_core::{Money, PaymentRow};
///
/// let mut cash = PaymentRow::new("Cash", None);
/// cash.amount = Money::from_cents(700);
/// let card = PaymentRow::new("Card", None);
///
/// let done = complete_payments(Money::from_cents(1000), vec![cash, card], None);
/// assert_eq!(done.payments[0].amount.cents(), 1000);
/// assert_eq!(done.paid_amount, Some(Money::from_cents(1000)));
/// ```
pub fn complete_payments(
    total: Money,
    rows: Vec<PaymentRow>,
    sources: Option<PaymentSources>,
) -> PaymentCompletion {
    let mut skipped = Vec::new();

    if shortfall(total, &rows).is_none() {
        return PaymentCompletion {
            payments: rows,
            paid_amount: None,
            skipped,
        };
    }

    let mut rows = rows;
    if rows.is_empty() {
        if let Some(sources) = sources {
            match sources.profile_defaults {
                Ok(defaults) if !defaults.is_empty() => rows = defaults,
                Ok(_) => skipped.push(SkippedStep::new(
                    STEP_PROFILE_ROWS,
                    "profile has no payment methods",
                )),
                Err(reason) => skipped.push(SkippedStep::new(STEP_PROFILE_ROWS, reason)),
            }

            if rows.is_empty() {
                match sources.first_method {
                    Ok(row) => rows.push(row),
                    Err(reason) => skipped.push(SkippedStep::new(STEP_FALLBACK_ROW, reason)),
                }
            }
        }
    }

    let Some(missing) = shortfall(total, &rows) else {
        return PaymentCompletion {
            payments: rows,
            paid_amount: None,
            skipped,
        };
    };

    match rows.first_mut() {
        Some(first) => match first.amount.checked_add(missing) {
            Some(amount) => {
                first.amount = amount;
                PaymentCompletion {
                    payments: rows,
                    paid_amount: Some(total),
                    skipped,
                }
            }
            None => {
                skipped.push(SkippedStep::new(STEP_COMPLETION, "payment amount out of range"));
                PaymentCompletion {
                    payments: rows,
                    paid_amount: None,
                    skipped,
                }
            }
        },
        None => {
            skipped.push(SkippedStep::new(STEP_COMPLETION, "no payment method available"));
            PaymentCompletion {
                payments: rows,
                paid_amount: None,
                skipped,
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mode: &str, cents: i64) -> PaymentRow {
        PaymentRow {
            mode_of_payment: mode.to_string(),
            account: Some(format!("{} - Co", mode)),
            amount: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_covered_rows_are_unchanged() {
        let rows = vec![row("Cash", 1500)];
        let done = complete_payments(Money::from_cents(1000), rows.clone(), None);
        assert_eq!(done.payments, rows);
        assert_eq!(done.paid_amount, None);
        assert!(done.skipped.is_empty());
    }

    #[test]
    fn test_zero_total_needs_nothing() {
        assert!(!needs_sources(Money::zero(), &[]));
        let done = complete_payments(Money::zero(), Vec::new(), None);
        assert!(done.payments.is_empty());
        assert!(done.skipped.is_empty());
    }

    #[test]
    fn test_first_row_absorbs_shortfall() {
        let done = complete_payments(
            Money::from_cents(1000),
            vec![row("Cash", 300), row("Card", 200)],
            None,
        );
        let sum = Money::checked_sum(done.payments.iter().map(|p| p.amount));
        assert_eq!(sum, Some(Money::from_cents(1000)));
        assert_eq!(done.payments[0].amount, Money::from_cents(800));
        assert_eq!(done.payments[1].amount, Money::from_cents(200));
    }

    #[test]
    fn test_profile_defaults_used_when_no_rows() {
        let sources = PaymentSources {
            profile_defaults: Ok(vec![row("Cash", 0), row("Card", 0)]),
            first_method: Ok(row("Cash", 0)),
        };
        assert!(needs_sources(Money::from_cents(500), &[]));
        let done = complete_payments(Money::from_cents(500), Vec::new(), Some(sources));
        assert_eq!(done.payments.len(), 2);
        assert_eq!(done.payments[0].amount, Money::from_cents(500));
        assert_eq!(done.paid_amount, Some(Money::from_cents(500)));
    }

    #[test]
    fn test_fallback_row_when_defaults_fail() {
        let sources = PaymentSources {
            profile_defaults: Err("no account for Card".to_string()),
            first_method: Ok(PaymentRow::new("Cash", None)),
        };
        let done = complete_payments(Money::from_cents(500), Vec::new(), Some(sources));
        assert_eq!(done.payments.len(), 1);
        assert_eq!(done.payments[0].amount, Money::from_cents(500));
        assert_eq!(done.skipped, vec![SkippedStep::new(STEP_PROFILE_ROWS, "no account for Card")]);
    }

    #[test]
    fn test_nothing_available_is_reported() {
        let done = complete_payments(
            Money::from_cents(500),
            Vec::new(),
            Some(PaymentSources::unavailable("profile not found")),
        );
        assert!(done.payments.is_empty());
        assert_eq!(done.paid_amount, None);
        let steps: Vec<&str> = done.skipped.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(steps, vec![STEP_PROFILE_ROWS, STEP_FALLBACK_ROW, STEP_COMPLETION]);
    }
}
