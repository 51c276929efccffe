//! # Sale Draft
//!
//! The order a cashier builds up before the ledger engine posts it.
//!
//! ## Draft → Invoice Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action            Draft Change             Engine (later)      │
//! │  ──────────────            ────────────             ──────────────      │
//! │                                                                         │
//! │  Scan product ───────────► add_line()                                   │
//! │  Scan same product ──────► quantity merged                              │
//! │  Take cash + card ───────► add_payment() × 2                            │
//! │                                                                         │
//! │  Confirm ────────────────► validate()  ───────────► post_sale():        │
//! │                                                     price snapshot,     │
//! │                                                     stock debit,        │
//! │                                                     wallet credit       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The draft carries no prices; the engine snapshots prices at posting
//! time and then asks the draft whether its payments cover the total.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::{MAX_LINE_QUANTITY, MAX_SALE_LINES};

// =============================================================================
// Draft Parts
// =============================================================================

/// One product line of a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    /// Product ID (UUID).
    pub product_id: String,

    /// Units requested.
    pub quantity: i64,
}

/// One tender of a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayment {
    pub method: PaymentMethod,

    /// Amount in cents.
    pub amount_cents: i64,
}

impl DraftPayment {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Draft
// =============================================================================

/// A sale waiting to be posted.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges
///   quantities)
/// - Payments are unique by method (adding the same method merges
///   amounts)
/// - Maximum lines: [`MAX_SALE_LINES`]
/// - Maximum quantity per line: [`MAX_LINE_QUANTITY`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    /// Business day this sale belongs to.
    pub day: NaiveDate,

    /// Selling employee (UUID).
    pub employee_id: String,

    pub lines: Vec<DraftLine>,

    pub payments: Vec<DraftPayment>,

    pub note: Option<String>,
}

impl SaleDraft {
    /// Creates an empty draft for a business day and employee.
    pub fn new(day: NaiveDate, employee_id: impl Into<String>) -> Self {
        SaleDraft {
            day,
            employee_id: employee_id.into(),
            lines: Vec::new(),
            payments: Vec::new(),
            note: None,
        }
    }

    /// Adds units of a product, merging with an existing line.
    pub fn add_line(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_SALE_LINES {
            return Err(CoreError::TooManyLines {
                max: MAX_SALE_LINES,
            });
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        self.lines.push(DraftLine {
            product_id: product_id.to_string(),
            quantity,
        });
        Ok(())
    }

    /// Adds a tender, merging with an existing payment of the same
    /// method.
    pub fn add_payment(&mut self, method: PaymentMethod, amount: Money) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "payment amount".to_string(),
            }
            .into());
        }

        if let Some(payment) = self.payments.iter_mut().find(|p| p.method == method) {
            payment.amount_cents += amount.cents();
        } else {
            self.payments.push(DraftPayment {
                method,
                amount_cents: amount.cents(),
            });
        }
        Ok(())
    }

    /// Sum of all tenders.
    pub fn payments_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount()).sum()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Structural validation, independent of prices.
    ///
    /// Drafts can arrive deserialized rather than built through
    /// `add_line`/`add_payment`, so the limits are re-checked here.
    pub fn validate(&self) -> CoreResult<()> {
        if self.employee_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "employee_id".to_string(),
            }
            .into());
        }
        if self.lines.is_empty() {
            return Err(CoreError::EmptySale);
        }
        if self.lines.len() > MAX_SALE_LINES {
            return Err(CoreError::TooManyLines {
                max: MAX_SALE_LINES,
            });
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: line.quantity,
                    max: MAX_LINE_QUANTITY,
                });
            }
        }
        for payment in &self.payments {
            if payment.amount_cents <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "payment amount".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Checks that the tenders cover the priced total exactly.
    ///
    /// Called by the engine once prices are snapshotted. A zero total
    /// with no payments is valid (free sample).
    pub fn check_payments_cover(&self, total: Money) -> CoreResult<()> {
        let paid = self.payments_total();
        if paid != total {
            return Err(CoreError::PaymentMismatch {
                total_cents: total.cents(),
                paid_cents: paid.cents(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    #[test]
    fn test_add_line_merges_same_product() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        draft.add_line("p1", 2).unwrap();
        draft.add_line("p1", 3).unwrap();

        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.total_quantity(), 5);
    }

    #[test]
    fn test_add_line_rejects_non_positive() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        assert!(draft.add_line("p1", 0).is_err());
        assert!(draft.add_line("p1", -1).is_err());
    }

    #[test]
    fn test_add_payment_merges_same_method() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        draft
            .add_payment(PaymentMethod::Cash, Money::from_cents(1000))
            .unwrap();
        draft
            .add_payment(PaymentMethod::Cash, Money::from_cents(500))
            .unwrap();
        draft
            .add_payment(PaymentMethod::Bank, Money::from_cents(2000))
            .unwrap();

        assert_eq!(draft.payments.len(), 2);
        assert_eq!(draft.payments_total(), Money::from_cents(3500));
    }

    #[test]
    fn test_validate_rejects_empty_sale() {
        let draft = SaleDraft::new(test_day(), "emp-1");
        assert!(matches!(draft.validate(), Err(CoreError::EmptySale)));
    }

    #[test]
    fn test_validate_rejects_missing_employee() {
        let mut draft = SaleDraft::new(test_day(), "  ");
        draft.add_line("p1", 1).unwrap();
        assert!(matches!(
            draft.validate(),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[test]
    fn test_quantity_cap() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        draft.add_line("p1", MAX_LINE_QUANTITY).unwrap();
        let err = draft.add_line("p1", 1).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { .. }));
    }

    #[test]
    fn test_payments_must_cover_total_exactly() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        draft.add_line("p1", 1).unwrap();
        draft
            .add_payment(PaymentMethod::Cash, Money::from_cents(4500))
            .unwrap();

        assert!(draft.check_payments_cover(Money::from_cents(4500)).is_ok());

        let err = draft
            .check_payments_cover(Money::from_cents(5000))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PaymentMismatch {
                total_cents: 5000,
                paid_cents: 4500
            }
        ));
    }

    #[test]
    fn test_zero_total_sale_needs_no_payments() {
        let mut draft = SaleDraft::new(test_day(), "emp-1");
        draft.add_line("p1", 1).unwrap();
        assert!(draft.check_payments_cover(Money::zero()).is_ok());
    }
}
