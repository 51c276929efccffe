//! # Invoice Repository
//!
//! Read access to posted and cancelled invoices.
//!
//! Invoices are written only by the ledger engine, inside the posting
//! transaction. This repository serves lookups: receipt reprints, day
//! listings, and the child rows (lines, payments, consumption) that
//! belong to an invoice.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use aroma_core::types::day_key;
use aroma_core::{ConsumptionEntry, Invoice, InvoiceLine, InvoicePayment};

use crate::error::LedgerResult;

const SELECT_INVOICE: &str = "SELECT id, invoice_no, day_key, status, employee_id, employee_name, \
     total_cents, note, posted_at, cancelled_at, cancel_reason FROM invoices";

/// Repository for invoice lookups.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Gets an invoice by its printed number.
    pub async fn get_by_no(&self, invoice_no: &str) -> LedgerResult<Option<Invoice>> {
        let invoice =
            sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE invoice_no = ?1"))
                .bind(invoice_no)
                .fetch_optional(&self.pool)
                .await?;

        Ok(invoice)
    }

    /// Lists all invoices of a business day, in receipt order.
    pub async fn list_day(&self, day: NaiveDate) -> LedgerResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "{SELECT_INVOICE} WHERE day_key = ?1 ORDER BY invoice_no"
        ))
        .bind(day_key(day))
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Gets the line items of an invoice, in entry order.
    pub async fn get_lines(&self, invoice_id: &str) -> LedgerResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            "SELECT id, invoice_id, product_id, sku_snapshot, name_snapshot, unit_price_cents, \
             quantity, line_total_cents \
             FROM invoice_lines WHERE invoice_id = ?1 ORDER BY rowid",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Gets the payments of an invoice, in entry order.
    pub async fn get_payments(&self, invoice_id: &str) -> LedgerResult<Vec<InvoicePayment>> {
        let payments = sqlx::query_as::<_, InvoicePayment>(
            "SELECT id, invoice_id, method, amount_cents \
             FROM invoice_payments WHERE invoice_id = ?1 ORDER BY rowid",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Gets the consumption snapshot of an invoice.
    ///
    /// These rows record the exact milligrams the sale debited and are
    /// what a cancellation restores.
    pub async fn get_consumption(&self, invoice_id: &str) -> LedgerResult<Vec<ConsumptionEntry>> {
        let entries = sqlx::query_as::<_, ConsumptionEntry>(
            "SELECT invoice_id, supply_id, consumed_mg \
             FROM invoice_consumption WHERE invoice_id = ?1 ORDER BY supply_id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Sums the payments recorded for an invoice, in cents.
    pub async fn payments_total(&self, invoice_id: &str) -> LedgerResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM invoice_payments WHERE invoice_id = ?1",
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Counts all invoices, cancelled ones included.
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
