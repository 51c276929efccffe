//! # Movement Repository
//!
//! Read access to the money movement journal.
//!
//! Every wallet change, whatever its origin (sale, cancellation,
//! deposit, withdrawal, transfer), lands here as one signed row with
//! the balance after it. The journal is append-only; nothing in the
//! system updates or deletes a movement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use aroma_core::types::day_key;
use aroma_core::{MethodAmounts, Money, Movement, MovementKind, PaymentMethod};

use crate::error::LedgerResult;

const SELECT_MOVEMENT: &str = "SELECT id, day_key, method, amount_cents, balance_after_cents, \
     kind, invoice_id, op_key, note, created_at FROM movements";

/// Repository for movement journal lookups.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Lists all movements of a business day, in journal order.
    pub async fn list_day(&self, day: NaiveDate) -> LedgerResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "{SELECT_MOVEMENT} WHERE day_key = ?1 ORDER BY rowid"
        ))
        .bind(day_key(day))
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists one method's movements of a business day, in journal order.
    pub async fn list_day_method(
        &self,
        day: NaiveDate,
        method: PaymentMethod,
    ) -> LedgerResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "{SELECT_MOVEMENT} WHERE day_key = ?1 AND method = ?2 ORDER BY rowid"
        ))
        .bind(day_key(day))
        .bind(method)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists the most recent movements, newest first.
    pub async fn recent(&self, limit: u32) -> LedgerResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "{SELECT_MOVEMENT} ORDER BY rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists the movements written under one operation key.
    pub async fn by_op_key(&self, op_key: &str) -> LedgerResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "{SELECT_MOVEMENT} WHERE op_key = ?1 ORDER BY rowid"
        ))
        .bind(op_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists the movements tied to one invoice (the sale credits and
    /// any cancellation reversals).
    pub async fn by_invoice(&self, invoice_id: &str) -> LedgerResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(&format!(
            "{SELECT_MOVEMENT} WHERE invoice_id = ?1 ORDER BY rowid"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Nets one method's movements over a business day, in cents.
    pub async fn day_method_net(&self, day: NaiveDate, method: PaymentMethod) -> LedgerResult<i64> {
        let net: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM movements \
             WHERE day_key = ?1 AND method = ?2",
        )
        .bind(day_key(day))
        .bind(method)
        .fetch_one(&self.pool)
        .await?;

        Ok(net)
    }

    /// Nets a business day's movements per method.
    pub async fn day_net_amounts(&self, day: NaiveDate) -> LedgerResult<MethodAmounts> {
        let mut amounts = MethodAmounts::zero();
        for method in PaymentMethod::ALL {
            let net = self.day_method_net(day, method).await?;
            amounts.set(method, Money::from_cents(net));
        }

        Ok(amounts)
    }

    /// Breaks a business day down by method and movement kind.
    pub async fn day_summary(&self, day: NaiveDate) -> LedgerResult<DaySummary> {
        let key = day_key(day);

        let totals = sqlx::query_as::<_, KindTotal>(
            "SELECT method, kind, COALESCE(SUM(amount_cents), 0) AS total_cents \
             FROM movements WHERE day_key = ?1 GROUP BY method, kind",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: Vec<DaySummaryLine> = PaymentMethod::ALL
            .iter()
            .map(|method| DaySummaryLine::zero(*method))
            .collect();

        for total in totals {
            let Some(line) = lines.iter_mut().find(|line| line.method == total.method) else {
                continue;
            };

            match total.kind {
                MovementKind::Sale => line.sales_cents += total.total_cents,
                MovementKind::Cancellation => line.cancellations_cents += total.total_cents,
                MovementKind::Deposit => line.deposits_cents += total.total_cents,
                MovementKind::Withdrawal => line.withdrawals_cents += total.total_cents,
                MovementKind::TransferIn | MovementKind::TransferOut => {
                    line.transfers_cents += total.total_cents;
                }
            }
            line.net_cents += total.total_cents;
        }

        Ok(DaySummary { day_key: key, lines })
    }
}

/// Per-method, per-kind totals of one business day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub day_key: String,
    pub lines: Vec<DaySummaryLine>,
}

impl DaySummary {
    /// Gets one method's summary line.
    pub fn line(&self, method: PaymentMethod) -> Option<&DaySummaryLine> {
        self.lines.iter().find(|line| line.method == method)
    }

    /// Nets the whole day across all methods.
    pub fn net_total(&self) -> Money {
        Money::from_cents(self.lines.iter().map(|line| line.net_cents).sum())
    }
}

/// One method's totals within a [`DaySummary`].
///
/// Sales and deposits carry positive signs, cancellations and
/// withdrawals negative ones; `transfers_cents` nets the in and out
/// legs and is zero when both stayed within the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummaryLine {
    pub method: PaymentMethod,
    pub sales_cents: i64,
    pub cancellations_cents: i64,
    pub deposits_cents: i64,
    pub withdrawals_cents: i64,
    pub transfers_cents: i64,
    pub net_cents: i64,
}

impl DaySummaryLine {
    fn zero(method: PaymentMethod) -> Self {
        DaySummaryLine {
            method,
            sales_cents: 0,
            cancellations_cents: 0,
            deposits_cents: 0,
            withdrawals_cents: 0,
            transfers_cents: 0,
            net_cents: 0,
        }
    }

    /// Nets this method's day.
    pub fn net(&self) -> Money {
        Money::from_cents(self.net_cents)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KindTotal {
    method: PaymentMethod,
    kind: MovementKind,
    total_cents: i64,
}
