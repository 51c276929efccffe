//! # Business Number Sequences
//!
//! Named counters behind zero-padded business numbers.
//!
//! ## Why Not Timestamps Or Row Counts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Invoice Number Allocation                             │
//! │                                                                         │
//! │  ❌ WRONG: COUNT(*) + 1 or timestamp-derived numbers                    │
//! │     Duplicates under concurrency, gaps after cancellations             │
//! │                                                                         │
//! │  ✅ CORRECT: a sequences row, bumped inside the posting                 │
//! │     transaction                                                         │
//! │     A rolled-back sale rolls the counter back with it, so               │
//! │     numbers stay gap-free; the UNIQUE index on invoice_no is            │
//! │     the backstop                                                        │
//! │                                                                         │
//! │  sequences:  name        next_value                                    │
//! │              invoice_no  43          ──allocate──►  "000042"            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, Transaction};

use aroma_core::INVOICE_NO_WIDTH;

use crate::error::LedgerResult;

/// Counter name backing invoice numbers.
pub const SEQ_INVOICE_NO: &str = "invoice_no";

/// Allocates the next value of a named counter.
///
/// Runs inside the caller's transaction: if the surrounding operation
/// rolls back, the allocation rolls back too. Unknown counters start
/// at 1.
pub(crate) async fn allocate(tx: &mut Transaction<'_, Sqlite>, name: &str) -> LedgerResult<i64> {
    let current: Option<i64> = sqlx::query_scalar("SELECT next_value FROM sequences WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

    let value = match current {
        Some(value) => {
            sqlx::query("UPDATE sequences SET next_value = ?2 WHERE name = ?1")
                .bind(name)
                .bind(value + 1)
                .execute(&mut **tx)
                .await?;
            value
        }
        None => {
            sqlx::query("INSERT INTO sequences (name, next_value) VALUES (?1, 2)")
                .bind(name)
                .execute(&mut **tx)
                .await?;
            1
        }
    };

    Ok(value)
}

/// Formats a counter value as a zero-padded invoice number.
///
/// Values beyond the pad width keep all their digits.
pub fn format_invoice_no(value: i64) -> String {
    format!("{:0width$}", value, width = INVOICE_NO_WIDTH)
}

/// Allocates and formats the next invoice number.
pub(crate) async fn next_invoice_no(tx: &mut Transaction<'_, Sqlite>) -> LedgerResult<String> {
    let value = allocate(tx, SEQ_INVOICE_NO).await?;
    Ok(format_invoice_no(value))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DbConfig, Ledger};

    #[test]
    fn test_format_pads_to_width() {
        assert_eq!(format_invoice_no(1), "000001");
        assert_eq!(format_invoice_no(42), "000042");
        assert_eq!(format_invoice_no(999_999), "999999");
        assert_eq!(format_invoice_no(1_234_567), "1234567");
    }

    #[tokio::test]
    async fn test_allocation_is_sequential() {
        let ledger = Ledger::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = ledger.pool().begin().await.unwrap();
        let first = next_invoice_no(&mut tx).await.unwrap();
        let second = next_invoice_no(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, "000001");
        assert_eq!(second, "000002");
    }

    #[tokio::test]
    async fn test_rolled_back_allocation_leaves_no_gap() {
        let ledger = Ledger::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = ledger.pool().begin().await.unwrap();
        let first = next_invoice_no(&mut tx).await.unwrap();
        assert_eq!(first, "000001");
        tx.rollback().await.unwrap();

        let mut tx = ledger.pool().begin().await.unwrap();
        let retried = next_invoice_no(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(retried, "000001");
    }

    #[tokio::test]
    async fn test_unseeded_counter_starts_at_one() {
        let ledger = Ledger::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = ledger.pool().begin().await.unwrap();
        assert_eq!(allocate(&mut tx, "credit_note").await.unwrap(), 1);
        assert_eq!(allocate(&mut tx, "credit_note").await.unwrap(), 2);
        tx.commit().await.unwrap();
    }
}
