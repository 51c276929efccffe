//! # Register Reconciliation Math
//!
//! Pure expected-vs-counted arithmetic for closing a cash-register day.
//!
//! ## Reconciliation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per payment method, for one business day:                              │
//! │                                                                         │
//! │    expected = opening float + Σ signed movements of the day             │
//! │    variance = counted - expected                                        │
//! │                                                                         │
//! │  Movements are the sale payments, cancellation reversals, deposits,     │
//! │  withdrawals and transfers the ledger recorded for that day.            │
//! │                                                                         │
//! │  variance > 0  →  drawer overage (more than the books say)              │
//! │  variance < 0  →  drawer shortage                                       │
//! │  variance = 0  →  balanced                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module never touches the database: the engine feeds it sums and
//! stores what comes back.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Method Amounts
// =============================================================================

/// A cents amount per payment method, used for opening floats, counted
/// totals, and movement sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodAmounts {
    pub cash_cents: i64,
    pub bank_cents: i64,
    pub transfer_cents: i64,
}

impl MethodAmounts {
    /// All methods at zero.
    pub const fn zero() -> Self {
        MethodAmounts {
            cash_cents: 0,
            bank_cents: 0,
            transfer_cents: 0,
        }
    }

    /// Builds from explicit cent values.
    pub const fn from_cents(cash: i64, bank: i64, transfer: i64) -> Self {
        MethodAmounts {
            cash_cents: cash,
            bank_cents: bank,
            transfer_cents: transfer,
        }
    }

    /// Returns the amount for one method.
    pub fn get(&self, method: PaymentMethod) -> Money {
        let cents = match method {
            PaymentMethod::Cash => self.cash_cents,
            PaymentMethod::Bank => self.bank_cents,
            PaymentMethod::Transfer => self.transfer_cents,
        };
        Money::from_cents(cents)
    }

    /// Sets the amount for one method.
    pub fn set(&mut self, method: PaymentMethod, amount: Money) {
        match method {
            PaymentMethod::Cash => self.cash_cents = amount.cents(),
            PaymentMethod::Bank => self.bank_cents = amount.cents(),
            PaymentMethod::Transfer => self.transfer_cents = amount.cents(),
        }
    }

    /// Adds to the amount for one method.
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        self.set(method, self.get(method) + amount);
    }

    /// Iterates `(method, amount)` in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (PaymentMethod, Money)> + '_ {
        PaymentMethod::ALL.into_iter().map(|m| (m, self.get(m)))
    }

    /// Sum across all methods.
    pub fn total(&self) -> Money {
        Money::from_cents(self.cash_cents + self.bank_cents + self.transfer_cents)
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// The reconciliation result for one payment method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileLine {
    pub method: PaymentMethod,
    /// Opening float.
    pub opening_cents: i64,
    /// Net signed movements of the day.
    pub movement_cents: i64,
    /// opening + movements.
    pub expected_cents: i64,
    /// Physically counted at close.
    pub counted_cents: i64,
    /// counted - expected.
    pub variance_cents: i64,
}

impl ReconcileLine {
    /// Computes one method's line.
    pub fn compute(
        method: PaymentMethod,
        opening: Money,
        movements: Money,
        counted: Money,
    ) -> Self {
        let expected = opening + movements;
        let variance = counted - expected;
        ReconcileLine {
            method,
            opening_cents: opening.cents(),
            movement_cents: movements.cents(),
            expected_cents: expected.cents(),
            counted_cents: counted.cents(),
            variance_cents: variance.cents(),
        }
    }

    /// Returns the expected amount as Money.
    #[inline]
    pub fn expected(&self) -> Money {
        Money::from_cents(self.expected_cents)
    }

    /// Returns the variance as Money.
    #[inline]
    pub fn variance(&self) -> Money {
        Money::from_cents(self.variance_cents)
    }

    /// Checks whether counted matched expected exactly.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.variance_cents == 0
    }
}

/// The full close-of-day report: one line per method plus totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Business day (`dd_mm_yyyy`).
    pub day_key: String,
    pub lines: Vec<ReconcileLine>,
}

impl ReconcileReport {
    /// Total expected across methods.
    pub fn expected_total(&self) -> Money {
        self.lines.iter().map(|l| l.expected()).sum()
    }

    /// Total counted across methods.
    pub fn counted_total(&self) -> Money {
        Money::from_cents(self.lines.iter().map(|l| l.counted_cents).sum())
    }

    /// Total variance across methods.
    pub fn variance_total(&self) -> Money {
        self.lines.iter().map(|l| l.variance()).sum()
    }

    /// Checks whether every method balanced.
    pub fn is_balanced(&self) -> bool {
        self.lines.iter().all(|l| l.is_balanced())
    }

    /// Returns the line for one method, if present.
    pub fn line(&self, method: PaymentMethod) -> Option<&ReconcileLine> {
        self.lines.iter().find(|l| l.method == method)
    }
}

/// Reconciles a register day from its opening floats, the day's net
/// movements, and the physical count.
pub fn reconcile(
    day_key: impl Into<String>,
    opening: &MethodAmounts,
    movements: &MethodAmounts,
    counted: &MethodAmounts,
) -> ReconcileReport {
    let lines = PaymentMethod::ALL
        .into_iter()
        .map(|method| {
            ReconcileLine::compute(
                method,
                opening.get(method),
                movements.get(method),
                counted.get(method),
            )
        })
        .collect();

    ReconcileReport {
        day_key: day_key.into(),
        lines,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
