//! # Register Repository
//!
//! Read access to register days and their per-method lines.
//!
//! Opening and closing a day are engine operations; this repository
//! answers "is today open?", "what were the openings?", and serves the
//! closing history.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use aroma_core::types::day_key;
use aroma_core::{MethodAmounts, Money, PaymentMethod, RegisterDay, RegisterLine};

use crate::error::LedgerResult;

const SELECT_DAY: &str = "SELECT id, day_key, status, opened_by, opened_at, closed_by, closed_at \
     FROM register_days";

/// Repository for register day lookups.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    /// Creates a new RegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Gets the register day for a business date.
    pub async fn get_day(&self, day: NaiveDate) -> LedgerResult<Option<RegisterDay>> {
        let register_day =
            sqlx::query_as::<_, RegisterDay>(&format!("{SELECT_DAY} WHERE day_key = ?1"))
                .bind(day_key(day))
                .fetch_optional(&self.pool)
                .await?;

        Ok(register_day)
    }

    /// Gets the per-method lines of a register day, in cash/bank/transfer
    /// order.
    pub async fn get_lines(&self, day_id: &str) -> LedgerResult<Vec<RegisterLine>> {
        let mut lines = sqlx::query_as::<_, RegisterLine>(
            "SELECT day_id, method, opening_cents, expected_cents, counted_cents, variance_cents \
             FROM register_lines WHERE day_id = ?1",
        )
        .bind(day_id)
        .fetch_all(&self.pool)
        .await?;

        lines.sort_by_key(|line| PaymentMethod::ALL.iter().position(|m| *m == line.method));

        Ok(lines)
    }

    /// Lists the most recently opened register days.
    ///
    /// Sorted by opening time; `day_key` strings do not sort
    /// chronologically.
    pub async fn list_recent(&self, limit: u32) -> LedgerResult<Vec<RegisterDay>> {
        let days =
            sqlx::query_as::<_, RegisterDay>(&format!("{SELECT_DAY} ORDER BY opened_at DESC LIMIT ?1"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(days)
    }
}

/// Collects the opening floats of a day's lines into per-method amounts.
pub(crate) fn opening_amounts(lines: &[RegisterLine]) -> MethodAmounts {
    let mut amounts = MethodAmounts::zero();
    for line in lines {
        amounts.set(line.method, Money::from_cents(line.opening_cents));
    }
    amounts
}
