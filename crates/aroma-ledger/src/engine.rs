//! # Ledger Engine
//!
//! The transactional heart of Aroma POS: posting sales, compensating
//! cancellations, the register day lifecycle, and wallet movements.
//!
//! ## Operation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Every Engine Operation Follows One Pipeline                │
//! │                                                                         │
//! │  1. Replay check     op_key already in ledger_ops?                     │
//! │                      → return the recorded outcome, write nothing      │
//! │  2. BEGIN                                                               │
//! │  3. INSERT ledger_ops   first write inside the transaction; a          │
//! │                         concurrent duplicate hits the primary key      │
//! │                         and is answered with the recorded outcome      │
//! │  4. Domain writes       stock debits, invoice rows, wallet balances,   │
//! │                         movement journal                               │
//! │  5. COMMIT              any error before this point rolls the whole    │
//! │                         operation back; there is no partial state      │
//! │                                                                         │
//! │  SQLITE_BUSY during 2-5 → bounded retry with linear backoff            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Movements Exist
//!
//! Wallet balances alone cannot answer "where did the cash go?". Every
//! balance change writes one signed journal row carrying the balance
//! after it, so the day's register reconciliation and the audit trail
//! both read from the same table.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use aroma_core::types::day_key;
use aroma_core::validation::validate_payment_amount;
use aroma_core::{
    reconcile, Composition, ConsumptionEntry, ConsumptionPlan, CoreError, Employee, Formula,
    FormulaComponent, Invoice, InvoiceLine, InvoicePayment, InvoiceStatus, MethodAmounts, Money,
    Movement, MovementKind, PaymentMethod, Product, ReconcileReport, RegisterDay, RegisterLine,
    RegisterStatus, SaleDraft, Supply, ValidationError, WalletAccount,
};

use crate::error::{LedgerError, LedgerResult};
use crate::repository::generate_id;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::movement::MovementRepository;
use crate::repository::register::opening_amounts;
use crate::sequence;

// =============================================================================
// Constants
// =============================================================================

/// How many times a busy operation is attempted before giving up.
const MAX_BUSY_ATTEMPTS: u32 = 3;

/// Base backoff between busy retries; attempt N waits N times this.
const BUSY_RETRY_BACKOFF: Duration = Duration::from_millis(50);

// Operation kinds recorded in ledger_ops. An op_key is bound to its
// kind forever; replaying it under another kind is a caller bug.
const OP_SALE: &str = "sale";
const OP_CANCEL: &str = "cancel";
const OP_DEPOSIT: &str = "deposit";
const OP_WITHDRAWAL: &str = "withdrawal";
const OP_TRANSFER: &str = "transfer";

// =============================================================================
// Operation Outcomes
// =============================================================================

/// A posted sale with everything the transaction wrote.
///
/// `replayed` is true when the operation key had already been recorded
/// and the stored outcome was returned instead of writing again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedSale {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub payments: Vec<InvoicePayment>,
    pub consumption: Vec<ConsumptionEntry>,
    pub replayed: bool,
}

/// A cancelled invoice after its compensating reversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledSale {
    pub invoice: Invoice,
    pub replayed: bool,
}

/// The movement a deposit or withdrawal produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdate {
    pub movement: Movement,
    pub replayed: bool,
}

/// The two movements of a wallet transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransfer {
    pub outgoing: Movement,
    pub incoming: Movement,
    pub replayed: bool,
}

/// A closed register day with its reconciliation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedDay {
    pub day: RegisterDay,
    pub report: ReconcileReport,
}

// =============================================================================
// Engine
// =============================================================================

/// Executes ledger operations atomically against the SQLite pool.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    pool: SqlitePool,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl LedgerEngine {
    /// Creates an engine over a pool.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerEngine {
            pool,
            max_attempts: MAX_BUSY_ATTEMPTS,
            retry_backoff: BUSY_RETRY_BACKOFF,
        }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Posts a sale: snapshots prices, debits supply stock per the
    /// product formulas, writes the invoice, credits the wallets.
    ///
    /// ## Arguments
    /// * `draft` - validated lines and tenders for one business day
    /// * `op_key` - idempotency key; replaying it returns the first outcome
    ///
    /// ## Returns
    /// * `Err(LedgerError::RegisterNotOpen)` - no register for the day
    /// * `Err(LedgerError::InsufficientStock)` - a supply cannot cover it
    /// * `Err(LedgerError::Core)` - draft invalid or payments mismatch total
    pub async fn post_sale(&self, draft: &SaleDraft, op_key: &str) -> LedgerResult<PostedSale> {
        draft.validate()?;

        self.with_busy_retry("post_sale", || self.post_sale_attempt(draft, op_key))
            .await
    }

    async fn post_sale_attempt(&self, draft: &SaleDraft, op_key: &str) -> LedgerResult<PostedSale> {
        // Replay lookups run outside the transaction; the pool may hold
        // a single connection.
        if let Some(invoice_id) = self.replay_guard(op_key, OP_SALE).await? {
            debug!(op_key = %op_key, "Replaying recorded sale");
            return self.load_posted_sale(&invoice_id, true).await;
        }

        match self.post_sale_tx(draft, op_key).await {
            Ok(invoice_id) => self.load_posted_sale(&invoice_id, false).await,
            Err(err) if is_op_row_conflict(&err) => {
                // A concurrent call with the same key recorded first.
                match self.replay_guard(op_key, OP_SALE).await? {
                    Some(invoice_id) => self.load_posted_sale(&invoice_id, true).await,
                    None => Err(op_row_vanished(op_key)),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn post_sale_tx(&self, draft: &SaleDraft, op_key: &str) -> LedgerResult<String> {
        let key = day_key(draft.day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let status: Option<RegisterStatus> =
            sqlx::query_scalar("SELECT status FROM register_days WHERE day_key = ?1")
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await?;
        match status {
            None => return Err(LedgerError::RegisterNotOpen { day_key: key }),
            Some(RegisterStatus::Closed) => {
                return Err(LedgerError::RegisterClosed { day_key: key })
            }
            Some(RegisterStatus::Open) => {}
        }

        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, full_name, is_active, created_at, updated_at FROM employees WHERE id = ?1",
        )
        .bind(&draft.employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::not_found("Employee", &draft.employee_id))?;
        if !employee.is_active {
            return Err(LedgerError::inactive("Employee", &employee.id));
        }

        // Price every line from the current catalog and aggregate the
        // consumption the formulas demand.
        let invoice_id = generate_id();
        let mut plan = ConsumptionPlan::new();
        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(draft.lines.len());

        for draft_line in &draft.lines {
            let product = sqlx::query_as::<_, Product>(
                "SELECT id, sku, name, price_cents, formula_id, essence_id, is_active, \
                 created_at, updated_at FROM products WHERE id = ?1",
            )
            .bind(&draft_line.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", &draft_line.product_id))?;
            if !product.is_active {
                return Err(LedgerError::inactive("Product", &product.id));
            }

            let composition = match product.formula_id.as_deref() {
                Some(formula_id) => Some(load_composition(&mut tx, formula_id).await?),
                None => None,
            };
            plan.add_line(&product, composition.as_ref(), draft_line.quantity)?;

            let line_total = product.price().multiply_quantity(draft_line.quantity);
            total = total + line_total;

            lines.push(InvoiceLine {
                id: generate_id(),
                invoice_id: invoice_id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: draft_line.quantity,
                line_total_cents: line_total.cents(),
            });
        }

        draft.check_payments_cover(total)?;

        record_op(&mut tx, op_key, OP_SALE, &invoice_id, now).await?;

        // Debit every supply the plan touches, keeping the exact
        // milligrams so the snapshot restores them verbatim on cancel.
        let mut consumption = Vec::with_capacity(plan.supply_count());
        for (supply_id, needed) in plan.requirements() {
            let supply = sqlx::query_as::<_, Supply>(
                "SELECT id, sku, name, kind, stock_mg, is_active, created_at, updated_at \
                 FROM supplies WHERE id = ?1",
            )
            .bind(supply_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::not_found("Supply", supply_id))?;

            if !supply.can_consume(needed) {
                return Err(LedgerError::InsufficientStock {
                    sku: supply.sku,
                    needed_mg: needed.milligrams(),
                    available_mg: supply.stock_mg,
                });
            }

            sqlx::query(
                "UPDATE supplies SET stock_mg = stock_mg - ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(supply_id)
            .bind(needed.milligrams())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            consumption.push(ConsumptionEntry {
                invoice_id: invoice_id.clone(),
                supply_id: supply_id.to_string(),
                consumed_mg: needed.milligrams(),
            });
        }

        // Number the invoice inside the transaction: a rollback returns
        // the number, so the printed series stays gap-free.
        let invoice_no = sequence::next_invoice_no(&mut tx).await?;

        sqlx::query(
            "INSERT INTO invoices (id, invoice_no, day_key, status, employee_id, employee_name, \
             total_cents, note, posted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&invoice_id)
        .bind(&invoice_no)
        .bind(&key)
        .bind(InvoiceStatus::Posted)
        .bind(&employee.id)
        .bind(&employee.full_name)
        .bind(total.cents())
        .bind(&draft.note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for entry in &consumption {
            sqlx::query(
                "INSERT INTO invoice_consumption (invoice_id, supply_id, consumed_mg) \
                 VALUES (?1, ?2, ?3)",
            )
            .bind(&entry.invoice_id)
            .bind(&entry.supply_id)
            .bind(entry.consumed_mg)
            .execute(&mut *tx)
            .await?;
        }

        for line in &lines {
            sqlx::query(
                "INSERT INTO invoice_lines (id, invoice_id, product_id, sku_snapshot, \
                 name_snapshot, unit_price_cents, quantity, line_total_cents) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&line.id)
            .bind(&line.invoice_id)
            .bind(&line.product_id)
            .bind(&line.sku_snapshot)
            .bind(&line.name_snapshot)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        for draft_payment in &draft.payments {
            sqlx::query(
                "INSERT INTO invoice_payments (id, invoice_id, method, amount_cents) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(generate_id())
            .bind(&invoice_id)
            .bind(draft_payment.method)
            .bind(draft_payment.amount_cents)
            .execute(&mut *tx)
            .await?;

            let balance_after =
                wallet_apply(&mut tx, draft_payment.method, draft_payment.amount(), true, now)
                    .await?;
            insert_movement(
                &mut tx,
                &Movement {
                    id: generate_id(),
                    day_key: key.clone(),
                    method: draft_payment.method,
                    amount_cents: draft_payment.amount_cents,
                    balance_after_cents: balance_after.cents(),
                    kind: MovementKind::Sale,
                    invoice_id: Some(invoice_id.clone()),
                    op_key: Some(op_key.to_string()),
                    note: None,
                    created_at: now,
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            invoice_no = %invoice_no,
            total_cents = total.cents(),
            lines = lines.len(),
            supplies = plan.supply_count(),
            "Posted sale"
        );

        Ok(invoice_id)
    }

    /// Cancels a posted invoice with a full compensating reversal:
    /// restores the consumption snapshot and debits the wallets that
    /// the sale credited.
    ///
    /// The reversal posts on `day` (the cancellation's business day),
    /// which may differ from the sale's.
    pub async fn cancel_invoice(
        &self,
        invoice_id: &str,
        reason: &str,
        day: NaiveDate,
        op_key: &str,
    ) -> LedgerResult<CancelledSale> {
        self.with_busy_retry("cancel_invoice", || {
            self.cancel_attempt(invoice_id, reason, day, op_key)
        })
        .await
    }

    async fn cancel_attempt(
        &self,
        invoice_id: &str,
        reason: &str,
        day: NaiveDate,
        op_key: &str,
    ) -> LedgerResult<CancelledSale> {
        if let Some(recorded_id) = self.replay_guard(op_key, OP_CANCEL).await? {
            debug!(op_key = %op_key, "Replaying recorded cancellation");
            return self.load_cancelled_sale(&recorded_id, true).await;
        }

        match self.cancel_tx(invoice_id, reason, day, op_key).await {
            Ok(()) => self.load_cancelled_sale(invoice_id, false).await,
            Err(err) if is_op_row_conflict(&err) => {
                match self.replay_guard(op_key, OP_CANCEL).await? {
                    Some(recorded_id) => self.load_cancelled_sale(&recorded_id, true).await,
                    None => Err(op_row_vanished(op_key)),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn cancel_tx(
        &self,
        invoice_id: &str,
        reason: &str,
        day: NaiveDate,
        op_key: &str,
    ) -> LedgerResult<()> {
        let key = day_key(day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT id, invoice_no, day_key, status, employee_id, employee_name, total_cents, \
             note, posted_at, cancelled_at, cancel_reason FROM invoices WHERE id = ?1",
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;

        if !invoice.can_cancel() {
            return Err(LedgerError::AlreadyCancelled {
                invoice_no: invoice.invoice_no,
            });
        }

        record_op(&mut tx, op_key, OP_CANCEL, &invoice.id, now).await?;

        // Restore exactly what the sale debited, immune to any formula
        // edit since then.
        let consumption = sqlx::query_as::<_, ConsumptionEntry>(
            "SELECT invoice_id, supply_id, consumed_mg FROM invoice_consumption \
             WHERE invoice_id = ?1 ORDER BY supply_id",
        )
        .bind(&invoice.id)
        .fetch_all(&mut *tx)
        .await?;

        for entry in &consumption {
            let result = sqlx::query(
                "UPDATE supplies SET stock_mg = stock_mg + ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(&entry.supply_id)
            .bind(entry.consumed_mg)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(LedgerError::not_found("Supply", &entry.supply_id));
            }
        }

        // Reverse the wallet credits. Balances may go negative here;
        // the money already left the drawer.
        let payments = sqlx::query_as::<_, InvoicePayment>(
            "SELECT id, invoice_id, method, amount_cents FROM invoice_payments \
             WHERE invoice_id = ?1 ORDER BY rowid",
        )
        .bind(&invoice.id)
        .fetch_all(&mut *tx)
        .await?;

        for payment in &payments {
            let balance_after =
                wallet_apply(&mut tx, payment.method, -payment.amount(), true, now).await?;
            insert_movement(
                &mut tx,
                &Movement {
                    id: generate_id(),
                    day_key: key.clone(),
                    method: payment.method,
                    amount_cents: -payment.amount_cents,
                    balance_after_cents: balance_after.cents(),
                    kind: MovementKind::Cancellation,
                    invoice_id: Some(invoice.id.clone()),
                    op_key: Some(op_key.to_string()),
                    note: None,
                    created_at: now,
                },
            )
            .await?;
        }

        let result = sqlx::query(
            "UPDATE invoices SET status = ?2, cancelled_at = ?3, cancel_reason = ?4 \
             WHERE id = ?1 AND status = ?5",
        )
        .bind(&invoice.id)
        .bind(InvoiceStatus::Cancelled)
        .bind(now)
        .bind(reason)
        .bind(InvoiceStatus::Posted)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyCancelled {
                invoice_no: invoice.invoice_no,
            });
        }

        tx.commit().await?;

        info!(
            invoice_no = %invoice.invoice_no,
            reason = %reason,
            "Cancelled invoice"
        );

        Ok(())
    }

    // =========================================================================
    // Register Days
    // =========================================================================

    /// Opens the register for a business day with per-method opening
    /// floats. One register record per day, ever; a closed day cannot
    /// reopen.
    pub async fn open_register(
        &self,
        day: NaiveDate,
        opened_by: &str,
        opening: &MethodAmounts,
    ) -> LedgerResult<RegisterDay> {
        for (_, amount) in opening.iter() {
            if amount.is_negative() {
                return Err(CoreError::from(ValidationError::OutOfRange {
                    field: "opening amount".to_string(),
                    min: 0,
                    max: i64::MAX,
                })
                .into());
            }
        }

        let result = self
            .with_busy_retry("open_register", || {
                self.open_register_tx(day, opened_by, opening)
            })
            .await;

        // Two concurrent opens race on the day_key unique index.
        match result {
            Err(LedgerError::UniqueViolation { ref field, .. })
                if field.contains("register_days") =>
            {
                Err(LedgerError::RegisterDayExists {
                    day_key: day_key(day),
                })
            }
            other => other,
        }
    }

    async fn open_register_tx(
        &self,
        day: NaiveDate,
        opened_by: &str,
        opening: &MethodAmounts,
    ) -> LedgerResult<RegisterDay> {
        let key = day_key(day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM register_days WHERE day_key = ?1")
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(LedgerError::RegisterDayExists { day_key: key });
        }

        let register_day = RegisterDay {
            id: generate_id(),
            day_key: key.clone(),
            status: RegisterStatus::Open,
            opened_by: opened_by.to_string(),
            opened_at: now,
            closed_by: None,
            closed_at: None,
        };

        sqlx::query(
            "INSERT INTO register_days (id, day_key, status, opened_by, opened_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&register_day.id)
        .bind(&register_day.day_key)
        .bind(register_day.status)
        .bind(&register_day.opened_by)
        .bind(register_day.opened_at)
        .execute(&mut *tx)
        .await?;

        for (method, amount) in opening.iter() {
            sqlx::query(
                "INSERT INTO register_lines (day_id, method, opening_cents) VALUES (?1, ?2, ?3)",
            )
            .bind(&register_day.id)
            .bind(method)
            .bind(amount.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(day = %key, opened_by = %opened_by, "Opened register day");

        Ok(register_day)
    }

    /// Closes the register for a business day: nets the day's movements
    /// per method, reconciles them against the counted amounts, and
    /// persists the report on the register lines.
    pub async fn close_register(
        &self,
        day: NaiveDate,
        closed_by: &str,
        counted: &MethodAmounts,
    ) -> LedgerResult<ClosedDay> {
        for (_, amount) in counted.iter() {
            if amount.is_negative() {
                return Err(CoreError::from(ValidationError::OutOfRange {
                    field: "counted amount".to_string(),
                    min: 0,
                    max: i64::MAX,
                })
                .into());
            }
        }

        self.with_busy_retry("close_register", || {
            self.close_register_tx(day, closed_by, counted)
        })
        .await
    }

    async fn close_register_tx(
        &self,
        day: NaiveDate,
        closed_by: &str,
        counted: &MethodAmounts,
    ) -> LedgerResult<ClosedDay> {
        let key = day_key(day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let register_day = sqlx::query_as::<_, RegisterDay>(
            "SELECT id, day_key, status, opened_by, opened_at, closed_by, closed_at \
             FROM register_days WHERE day_key = ?1",
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::RegisterNotOpen {
            day_key: key.clone(),
        })?;

        if !register_day.is_open() {
            return Err(LedgerError::RegisterClosed { day_key: key });
        }

        let lines = sqlx::query_as::<_, RegisterLine>(
            "SELECT day_id, method, opening_cents, expected_cents, counted_cents, variance_cents \
             FROM register_lines WHERE day_id = ?1",
        )
        .bind(&register_day.id)
        .fetch_all(&mut *tx)
        .await?;
        let opening = opening_amounts(&lines);

        let mut movements = MethodAmounts::zero();
        for method in PaymentMethod::ALL {
            let net: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(amount_cents), 0) FROM movements \
                 WHERE day_key = ?1 AND method = ?2",
            )
            .bind(&key)
            .bind(method)
            .fetch_one(&mut *tx)
            .await?;
            movements.set(method, Money::from_cents(net));
        }

        let report = reconcile(key.clone(), &opening, &movements, counted);

        for line in &report.lines {
            sqlx::query(
                "UPDATE register_lines SET expected_cents = ?3, counted_cents = ?4, \
                 variance_cents = ?5 WHERE day_id = ?1 AND method = ?2",
            )
            .bind(&register_day.id)
            .bind(line.method)
            .bind(line.expected_cents)
            .bind(line.counted_cents)
            .bind(line.variance_cents)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "UPDATE register_days SET status = ?2, closed_by = ?3, closed_at = ?4 \
             WHERE id = ?1 AND status = ?5",
        )
        .bind(&register_day.id)
        .bind(RegisterStatus::Closed)
        .bind(closed_by)
        .bind(now)
        .bind(RegisterStatus::Open)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::RegisterClosed { day_key: key });
        }

        tx.commit().await?;

        info!(
            day = %key,
            closed_by = %closed_by,
            variance_cents = report.variance_total().cents(),
            balanced = report.is_balanced(),
            "Closed register day"
        );

        Ok(ClosedDay {
            day: RegisterDay {
                status: RegisterStatus::Closed,
                closed_by: Some(closed_by.to_string()),
                closed_at: Some(now),
                ..register_day
            },
            report,
        })
    }

    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Deposits into a wallet account.
    pub async fn deposit(
        &self,
        method: PaymentMethod,
        amount: Money,
        day: NaiveDate,
        note: Option<&str>,
        op_key: &str,
    ) -> LedgerResult<WalletUpdate> {
        validate_payment_amount(amount.cents()).map_err(CoreError::from)?;

        let op = WalletOp {
            kind: MovementKind::Deposit,
            method,
            delta: amount,
            allow_negative: true,
            day,
            note,
            op_key,
        };
        self.with_busy_retry("deposit", || self.wallet_op_attempt(op))
            .await
    }

    /// Withdraws from a wallet account; refuses to overdraw.
    pub async fn withdraw(
        &self,
        method: PaymentMethod,
        amount: Money,
        day: NaiveDate,
        note: Option<&str>,
        op_key: &str,
    ) -> LedgerResult<WalletUpdate> {
        validate_payment_amount(amount.cents()).map_err(CoreError::from)?;

        let op = WalletOp {
            kind: MovementKind::Withdrawal,
            method,
            delta: -amount,
            allow_negative: false,
            day,
            note,
            op_key,
        };
        self.with_busy_retry("withdraw", || self.wallet_op_attempt(op))
            .await
    }

    async fn wallet_op_attempt(&self, op: WalletOp<'_>) -> LedgerResult<WalletUpdate> {
        let op_kind = op_kind_for(op.kind);

        if let Some(movement_id) = self.replay_guard(op.op_key, op_kind).await? {
            debug!(op_key = %op.op_key, "Replaying recorded wallet movement");
            return self.load_wallet_update(&movement_id, true).await;
        }

        match self.wallet_op_tx(op).await {
            Ok(movement) => Ok(WalletUpdate {
                movement,
                replayed: false,
            }),
            Err(err) if is_op_row_conflict(&err) => {
                match self.replay_guard(op.op_key, op_kind).await? {
                    Some(movement_id) => self.load_wallet_update(&movement_id, true).await,
                    None => Err(op_row_vanished(op.op_key)),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn wallet_op_tx(&self, op: WalletOp<'_>) -> LedgerResult<Movement> {
        let key = day_key(op.day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let movement_id = generate_id();
        record_op(&mut tx, op.op_key, op_kind_for(op.kind), &movement_id, now).await?;

        let balance_after =
            wallet_apply(&mut tx, op.method, op.delta, op.allow_negative, now).await?;

        let movement = Movement {
            id: movement_id,
            day_key: key,
            method: op.method,
            amount_cents: op.delta.cents(),
            balance_after_cents: balance_after.cents(),
            kind: op.kind,
            invoice_id: None,
            op_key: Some(op.op_key.to_string()),
            note: op.note.map(String::from),
            created_at: now,
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        info!(
            method = %op.method,
            amount_cents = op.delta.cents(),
            balance_after_cents = balance_after.cents(),
            kind = ?op.kind,
            "Posted wallet movement"
        );

        Ok(movement)
    }

    /// Moves funds between two wallet accounts atomically: both legs
    /// post, or neither does.
    pub async fn transfer(
        &self,
        from: PaymentMethod,
        to: PaymentMethod,
        amount: Money,
        day: NaiveDate,
        note: Option<&str>,
        op_key: &str,
    ) -> LedgerResult<WalletTransfer> {
        validate_payment_amount(amount.cents()).map_err(CoreError::from)?;
        if from == to {
            return Err(LedgerError::SameAccount { method: from });
        }

        self.with_busy_retry("transfer", || {
            self.transfer_attempt(from, to, amount, day, note, op_key)
        })
        .await
    }

    async fn transfer_attempt(
        &self,
        from: PaymentMethod,
        to: PaymentMethod,
        amount: Money,
        day: NaiveDate,
        note: Option<&str>,
        op_key: &str,
    ) -> LedgerResult<WalletTransfer> {
        if self.replay_guard(op_key, OP_TRANSFER).await?.is_some() {
            debug!(op_key = %op_key, "Replaying recorded transfer");
            return self.load_wallet_transfer(op_key, true).await;
        }

        match self.transfer_tx(from, to, amount, day, note, op_key).await {
            Ok((outgoing, incoming)) => Ok(WalletTransfer {
                outgoing,
                incoming,
                replayed: false,
            }),
            Err(err) if is_op_row_conflict(&err) => {
                match self.replay_guard(op_key, OP_TRANSFER).await? {
                    Some(_) => self.load_wallet_transfer(op_key, true).await,
                    None => Err(op_row_vanished(op_key)),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn transfer_tx(
        &self,
        from: PaymentMethod,
        to: PaymentMethod,
        amount: Money,
        day: NaiveDate,
        note: Option<&str>,
        op_key: &str,
    ) -> LedgerResult<(Movement, Movement)> {
        let key = day_key(day);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let outgoing_id = generate_id();
        record_op(&mut tx, op_key, OP_TRANSFER, &outgoing_id, now).await?;

        let from_balance = wallet_apply(&mut tx, from, -amount, false, now).await?;
        let outgoing = Movement {
            id: outgoing_id,
            day_key: key.clone(),
            method: from,
            amount_cents: -amount.cents(),
            balance_after_cents: from_balance.cents(),
            kind: MovementKind::TransferOut,
            invoice_id: None,
            op_key: Some(op_key.to_string()),
            note: note.map(String::from),
            created_at: now,
        };
        insert_movement(&mut tx, &outgoing).await?;

        let to_balance = wallet_apply(&mut tx, to, amount, true, now).await?;
        let incoming = Movement {
            id: generate_id(),
            day_key: key,
            method: to,
            amount_cents: amount.cents(),
            balance_after_cents: to_balance.cents(),
            kind: MovementKind::TransferIn,
            invoice_id: None,
            op_key: Some(op_key.to_string()),
            note: note.map(String::from),
            created_at: now,
        };
        insert_movement(&mut tx, &incoming).await?;

        tx.commit().await?;

        info!(
            from = %from,
            to = %to,
            amount_cents = amount.cents(),
            "Transferred between wallets"
        );

        Ok((outgoing, incoming))
    }

    // =========================================================================
    // Replay and Retry Plumbing
    // =========================================================================

    /// Looks up an operation key.
    ///
    /// Returns the recorded entity ID when the key was already used for
    /// the same kind; errors when it was used for a different kind.
    async fn replay_guard(&self, op_key: &str, kind: &str) -> LedgerResult<Option<String>> {
        let row = sqlx::query_as::<_, OpRow>(
            "SELECT op_kind, entity_id FROM ledger_ops WHERE op_key = ?1",
        )
        .bind(op_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(op) if op.op_kind == kind => Ok(Some(op.entity_id)),
            Some(op) => Err(LedgerError::OpKeyConflict {
                op_key: op_key.to_string(),
                existing_kind: op.op_kind,
            }),
        }
    }

    /// Runs an operation attempt, retrying bounded times on busy.
    async fn with_busy_retry<T, F, Fut>(&self, op: &str, mut run: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = LedgerResult<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match run().await {
                Err(err) if err.is_busy() && attempt < self.max_attempts => {
                    warn!(op = %op, attempt, "Database busy, retrying");
                    sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    // =========================================================================
    // Outcome Loaders
    // =========================================================================

    async fn load_posted_sale(&self, invoice_id: &str, replayed: bool) -> LedgerResult<PostedSale> {
        let invoices = InvoiceRepository::new(self.pool.clone());
        let invoice = invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;
        let lines = invoices.get_lines(invoice_id).await?;
        let payments = invoices.get_payments(invoice_id).await?;
        let consumption = invoices.get_consumption(invoice_id).await?;

        Ok(PostedSale {
            invoice,
            lines,
            payments,
            consumption,
            replayed,
        })
    }

    async fn load_cancelled_sale(
        &self,
        invoice_id: &str,
        replayed: bool,
    ) -> LedgerResult<CancelledSale> {
        let invoice = InvoiceRepository::new(self.pool.clone())
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_id))?;

        Ok(CancelledSale { invoice, replayed })
    }

    async fn load_wallet_update(
        &self,
        movement_id: &str,
        replayed: bool,
    ) -> LedgerResult<WalletUpdate> {
        let movement = sqlx::query_as::<_, Movement>(
            "SELECT id, day_key, method, amount_cents, balance_after_cents, kind, invoice_id, \
             op_key, note, created_at FROM movements WHERE id = ?1",
        )
        .bind(movement_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("Movement", movement_id))?;

        Ok(WalletUpdate { movement, replayed })
    }

    async fn load_wallet_transfer(
        &self,
        op_key: &str,
        replayed: bool,
    ) -> LedgerResult<WalletTransfer> {
        let movements = MovementRepository::new(self.pool.clone())
            .by_op_key(op_key)
            .await?;

        let outgoing = movements
            .iter()
            .find(|m| m.kind == MovementKind::TransferOut)
            .cloned();
        let incoming = movements
            .iter()
            .find(|m| m.kind == MovementKind::TransferIn)
            .cloned();

        match (outgoing, incoming) {
            (Some(outgoing), Some(incoming)) => Ok(WalletTransfer {
                outgoing,
                incoming,
                replayed,
            }),
            _ => Err(LedgerError::Internal(format!(
                "transfer legs missing for operation key '{op_key}'"
            ))),
        }
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OpRow {
    op_kind: String,
    entity_id: String,
}

/// A deposit or withdrawal normalized to a signed balance delta.
#[derive(Debug, Clone, Copy)]
struct WalletOp<'a> {
    kind: MovementKind,
    method: PaymentMethod,
    delta: Money,
    allow_negative: bool,
    day: NaiveDate,
    note: Option<&'a str>,
    op_key: &'a str,
}

fn op_kind_for(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Sale => OP_SALE,
        MovementKind::Cancellation => OP_CANCEL,
        MovementKind::Deposit => OP_DEPOSIT,
        MovementKind::Withdrawal => OP_WITHDRAWAL,
        MovementKind::TransferIn | MovementKind::TransferOut => OP_TRANSFER,
    }
}

/// Whether an error is the ledger_ops primary key rejecting a
/// concurrent duplicate of the same operation.
fn is_op_row_conflict(err: &LedgerError) -> bool {
    matches!(err, LedgerError::UniqueViolation { field, .. } if field.contains("ledger_ops"))
}

fn op_row_vanished(op_key: &str) -> LedgerError {
    LedgerError::Internal(format!(
        "operation key '{op_key}' vanished after a duplicate-key conflict"
    ))
}

/// Records the operation key as the first write of a transaction.
async fn record_op(
    tx: &mut Transaction<'_, Sqlite>,
    op_key: &str,
    kind: &str,
    entity_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    sqlx::query(
        "INSERT INTO ledger_ops (op_key, op_kind, entity_id, performed_at) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(op_key)
    .bind(kind)
    .bind(entity_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Applies a signed delta to a wallet account and returns the balance
/// after it.
async fn wallet_apply(
    tx: &mut Transaction<'_, Sqlite>,
    method: PaymentMethod,
    delta: Money,
    allow_negative: bool,
    now: DateTime<Utc>,
) -> LedgerResult<Money> {
    let account = sqlx::query_as::<_, WalletAccount>(
        "SELECT method, balance_cents, updated_at FROM wallet_accounts WHERE method = ?1",
    )
    .bind(method)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| LedgerError::not_found("Wallet account", method.as_str()))?;

    let balance_after = account.balance() + delta;
    if !allow_negative && balance_after.is_negative() {
        return Err(LedgerError::InsufficientFunds {
            method,
            needed_cents: delta.abs().cents(),
            available_cents: account.balance_cents,
        });
    }

    sqlx::query("UPDATE wallet_accounts SET balance_cents = ?2, updated_at = ?3 WHERE method = ?1")
        .bind(method)
        .bind(balance_after.cents())
        .bind(now)
        .execute(&mut **tx)
        .await?;

    Ok(balance_after)
}

async fn insert_movement(tx: &mut Transaction<'_, Sqlite>, movement: &Movement) -> LedgerResult<()> {
    sqlx::query(
        "INSERT INTO movements (id, day_key, method, amount_cents, balance_after_cents, kind, \
         invoice_id, op_key, note, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&movement.id)
    .bind(&movement.day_key)
    .bind(movement.method)
    .bind(movement.amount_cents)
    .bind(movement.balance_after_cents)
    .bind(movement.kind)
    .bind(&movement.invoice_id)
    .bind(&movement.op_key)
    .bind(&movement.note)
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Loads a formula with its components inside the posting transaction.
async fn load_composition(
    tx: &mut Transaction<'_, Sqlite>,
    formula_id: &str,
) -> LedgerResult<Composition> {
    let formula = sqlx::query_as::<_, Formula>(
        "SELECT id, name, essence_mg_per_unit, created_at, updated_at FROM formulas WHERE id = ?1",
    )
    .bind(formula_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| LedgerError::not_found("Formula", formula_id))?;

    let components = sqlx::query_as::<_, FormulaComponent>(
        "SELECT formula_id, supply_id, mg_per_unit FROM formula_components \
         WHERE formula_id = ?1 ORDER BY supply_id",
    )
    .bind(formula_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(Composition {
        formula,
        components,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DbConfig, Ledger};
    use aroma_core::{ComponentSpec, SupplyKind};

    struct Fixture {
        ledger: Ledger,
        engine: LedgerEngine,
        day: NaiveDate,
        employee: Employee,
        formula: Formula,
        alcohol: Supply,
        jasmine: Supply,
        perfume: Product,
        gift_box: Product,
    }

    /// In-memory ledger with one employee, two supplies, one formula
    /// and two products (a formula perfume and a resale gift box).
    async fn fixture() -> Fixture {
        let ledger = Ledger::new(DbConfig::in_memory())
            .await
            .expect("Failed to create in-memory ledger");
        let engine = ledger.engine();
        let now = Utc::now();
        let day = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();

        let employee = Employee {
            id: generate_id(),
            full_name: "Marta Kowalska".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.employees().insert(&employee).await.unwrap();

        let alcohol = Supply {
            id: generate_id(),
            sku: "ALC96".to_string(),
            name: "Perfumer's Alcohol".to_string(),
            kind: SupplyKind::Alcohol,
            stock_mg: 100_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.supplies().insert(&alcohol).await.unwrap();

        let jasmine = Supply {
            id: generate_id(),
            sku: "ESS-JAS".to_string(),
            name: "Jasmine Absolute".to_string(),
            kind: SupplyKind::Essence,
            stock_mg: 10_000,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.supplies().insert(&jasmine).await.unwrap();

        let formula = Formula {
            id: generate_id(),
            name: "Jasmine Night".to_string(),
            essence_mg_per_unit: 350,
            created_at: now,
            updated_at: now,
        };
        let components = vec![ComponentSpec {
            supply_id: alcohol.id.clone(),
            mg_per_unit: 650,
        }];
        ledger.formulas().insert(&formula, &components).await.unwrap();

        let perfume = Product {
            id: generate_id(),
            sku: "PRF-001".to_string(),
            name: "Jasmine Night 50ml".to_string(),
            price_cents: 5_000,
            formula_id: Some(formula.id.clone()),
            essence_id: Some(jasmine.id.clone()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.products().insert(&perfume).await.unwrap();

        let gift_box = Product {
            id: generate_id(),
            sku: "ACC-001".to_string(),
            name: "Gift Box".to_string(),
            price_cents: 1_500,
            formula_id: None,
            essence_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.products().insert(&gift_box).await.unwrap();

        Fixture {
            ledger,
            engine,
            day,
            employee,
            formula,
            alcohol,
            jasmine,
            perfume,
            gift_box,
        }
    }

    async fn open_day(fx: &Fixture) {
        fx.engine
            .open_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap();
    }

    fn perfume_draft(fx: &Fixture, quantity: i64, method: PaymentMethod, cents: i64) -> SaleDraft {
        let mut draft = SaleDraft::new(fx.day, fx.employee.id.clone());
        draft.add_line(&fx.perfume.id, quantity).unwrap();
        draft.add_payment(method, Money::from_cents(cents)).unwrap();
        draft
    }

    async fn stock_of(fx: &Fixture, supply_id: &str) -> i64 {
        fx.ledger
            .supplies()
            .get_by_id(supply_id)
            .await
            .unwrap()
            .unwrap()
            .stock_mg
    }

    async fn balance_of(fx: &Fixture, method: PaymentMethod) -> i64 {
        fx.ledger.wallets().get(method).await.unwrap().balance_cents
    }

    #[tokio::test]
    async fn test_post_sale_debits_stock_and_credits_wallet() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        let posted = fx.engine.post_sale(&draft, "op-sale-1").await.unwrap();

        assert!(!posted.replayed);
        assert_eq!(posted.invoice.invoice_no, "000001");
        assert_eq!(posted.invoice.status, InvoiceStatus::Posted);
        assert_eq!(posted.invoice.total_cents, 10_000);
        assert_eq!(posted.invoice.employee_name, "Marta Kowalska");
        assert_eq!(posted.lines.len(), 1);
        assert_eq!(posted.lines[0].sku_snapshot, "PRF-001");
        assert_eq!(posted.lines[0].quantity, 2);
        assert_eq!(posted.lines[0].line_total_cents, 10_000);

        // 2 units: 700 mg essence, 1300 mg alcohol.
        assert_eq!(posted.consumption.len(), 2);
        let essence = posted
            .consumption
            .iter()
            .find(|c| c.supply_id == fx.jasmine.id)
            .unwrap();
        assert_eq!(essence.consumed_mg, 700);
        let alcohol = posted
            .consumption
            .iter()
            .find(|c| c.supply_id == fx.alcohol.id)
            .unwrap();
        assert_eq!(alcohol.consumed_mg, 1_300);

        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 9_300);
        assert_eq!(stock_of(&fx, &fx.alcohol.id).await, 98_700);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 10_000);

        let movements = fx
            .ledger
            .movements()
            .by_invoice(&posted.invoice.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Sale);
        assert_eq!(movements[0].amount_cents, 10_000);
        assert_eq!(movements[0].balance_after_cents, 10_000);
        assert_eq!(movements[0].op_key.as_deref(), Some("op-sale-1"));
    }

    #[tokio::test]
    async fn test_resale_product_consumes_nothing() {
        let fx = fixture().await;
        open_day(&fx).await;

        let mut draft = SaleDraft::new(fx.day, fx.employee.id.clone());
        draft.add_line(&fx.gift_box.id, 3).unwrap();
        draft
            .add_payment(PaymentMethod::Bank, Money::from_cents(4_500))
            .unwrap();

        let posted = fx.engine.post_sale(&draft, "op-box").await.unwrap();

        assert_eq!(posted.invoice.total_cents, 4_500);
        assert!(posted.consumption.is_empty());
        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 10_000);
        assert_eq!(stock_of(&fx, &fx.alcohol.id).await, 100_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Bank).await, 4_500);
    }

    #[tokio::test]
    async fn test_free_sample_posts_without_payments() {
        let fx = fixture().await;
        open_day(&fx).await;

        let now = Utc::now();
        let sample = Product {
            id: generate_id(),
            sku: "SAMPLE-1".to_string(),
            name: "Tester Vial".to_string(),
            price_cents: 0,
            formula_id: None,
            essence_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        fx.ledger.products().insert(&sample).await.unwrap();

        let mut draft = SaleDraft::new(fx.day, fx.employee.id.clone());
        draft.add_line(&sample.id, 1).unwrap();

        let posted = fx.engine.post_sale(&draft, "op-sample").await.unwrap();
        assert_eq!(posted.invoice.total_cents, 0);
        assert!(posted.payments.is_empty());
        assert!(fx
            .ledger
            .movements()
            .by_invoice(&posted.invoice.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts_whole_sale() {
        let fx = fixture().await;
        open_day(&fx).await;

        // 30 units need 10_500 mg essence; only 10_000 mg exists.
        let draft = perfume_draft(&fx, 30, PaymentMethod::Cash, 150_000);
        let err = fx.engine.post_sale(&draft, "op-big").await.unwrap_err();

        match err {
            LedgerError::InsufficientStock {
                sku,
                needed_mg,
                available_mg,
            } => {
                assert_eq!(sku, "ESS-JAS");
                assert_eq!(needed_mg, 10_500);
                assert_eq!(available_mg, 10_000);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        // Nothing survived the rollback.
        assert_eq!(fx.ledger.invoices().count().await.unwrap(), 0);
        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 10_000);
        assert_eq!(stock_of(&fx, &fx.alcohol.id).await, 100_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 0);
        assert!(fx.ledger.movements().recent(10).await.unwrap().is_empty());

        // The operation key and the invoice number rolled back too: the
        // same key posts fresh and gets the first number.
        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
        let posted = fx.engine.post_sale(&draft, "op-big").await.unwrap();
        assert!(!posted.replayed);
        assert_eq!(posted.invoice.invoice_no, "000001");
    }

    #[tokio::test]
    async fn test_payment_mismatch_rejected() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 4_999);
        let err = fx.engine.post_sale(&draft, "op-short").await.unwrap_err();

        match err {
            LedgerError::Core(CoreError::PaymentMismatch {
                total_cents,
                paid_cents,
            }) => {
                assert_eq!(total_cents, 5_000);
                assert_eq!(paid_cents, 4_999);
            }
            other => panic!("Expected PaymentMismatch, got {other:?}"),
        }

        assert_eq!(fx.ledger.invoices().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sale_requires_open_register() {
        let fx = fixture().await;

        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
        let err = fx.engine.post_sale(&draft, "op-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::RegisterNotOpen { .. }));

        open_day(&fx).await;
        fx.engine
            .close_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap();

        let err = fx.engine.post_sale(&draft, "op-2").await.unwrap_err();
        assert!(matches!(err, LedgerError::RegisterClosed { .. }));
    }

    #[tokio::test]
    async fn test_sale_rejects_inactive_product_and_employee() {
        let fx = fixture().await;
        open_day(&fx).await;

        fx.ledger.products().deactivate(&fx.gift_box.id).await.unwrap();
        let mut draft = SaleDraft::new(fx.day, fx.employee.id.clone());
        draft.add_line(&fx.gift_box.id, 1).unwrap();
        draft
            .add_payment(PaymentMethod::Cash, Money::from_cents(1_500))
            .unwrap();
        let err = fx.engine.post_sale(&draft, "op-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::Inactive { ref entity, .. } if entity == "Product"));

        fx.ledger.employees().deactivate(&fx.employee.id).await.unwrap();
        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
        let err = fx.engine.post_sale(&draft, "op-2").await.unwrap_err();
        assert!(matches!(err, LedgerError::Inactive { ref entity, .. } if entity == "Employee"));
    }

    #[tokio::test]
    async fn test_missing_essence_link_rejected() {
        let fx = fixture().await;
        open_day(&fx).await;

        let now = Utc::now();
        let rose_formula = Formula {
            id: generate_id(),
            name: "Rose Dawn".to_string(),
            essence_mg_per_unit: 300,
            created_at: now,
            updated_at: now,
        };
        fx.ledger.formulas().insert(&rose_formula, &[]).await.unwrap();

        // Formula demands essence but the product has no essence link.
        let rose = Product {
            id: generate_id(),
            sku: "PRF-090".to_string(),
            name: "Rose Dawn 50ml".to_string(),
            price_cents: 3_000,
            formula_id: Some(rose_formula.id.clone()),
            essence_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        fx.ledger.products().insert(&rose).await.unwrap();

        let mut draft = SaleDraft::new(fx.day, fx.employee.id.clone());
        draft.add_line(&rose.id, 1).unwrap();
        draft
            .add_payment(PaymentMethod::Cash, Money::from_cents(3_000))
            .unwrap();

        let err = fx.engine.post_sale(&draft, "op-rose").await.unwrap_err();
        assert!(
            matches!(err, LedgerError::Core(CoreError::MissingEssence { ref sku }) if sku == "PRF-090")
        );
    }

    #[tokio::test]
    async fn test_sale_replay_returns_same_invoice() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        let first = fx.engine.post_sale(&draft, "op-once").await.unwrap();
        let second = fx.engine.post_sale(&draft, "op-once").await.unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.invoice.id, second.invoice.id);
        assert_eq!(second.invoice.invoice_no, "000001");

        // No double posting anywhere.
        assert_eq!(fx.ledger.invoices().count().await.unwrap(), 1);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 10_000);
        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 9_300);
    }

    #[tokio::test]
    async fn test_op_key_conflict_detected() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
        fx.engine.post_sale(&draft, "op-shared").await.unwrap();

        let err = fx
            .engine
            .deposit(
                PaymentMethod::Cash,
                Money::from_cents(1_000),
                fx.day,
                None,
                "op-shared",
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, LedgerError::OpKeyConflict { ref existing_kind, .. } if existing_kind == "sale")
        );
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_sequential() {
        let fx = fixture().await;
        open_day(&fx).await;

        for i in 1..=3 {
            let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
            let posted = fx.engine.post_sale(&draft, &format!("op-{i}")).await.unwrap();
            assert_eq!(posted.invoice.invoice_no, format!("{i:06}"));
        }

        let day_invoices = fx.ledger.invoices().list_day(fx.day).await.unwrap();
        assert_eq!(day_invoices.len(), 3);
        assert_eq!(day_invoices[0].invoice_no, "000001");
        assert_eq!(day_invoices[2].invoice_no, "000003");
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_wallet() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        let posted = fx.engine.post_sale(&draft, "op-sale").await.unwrap();

        let cancelled = fx
            .engine
            .cancel_invoice(&posted.invoice.id, "customer returned", fx.day, "op-cancel")
            .await
            .unwrap();

        assert!(!cancelled.replayed);
        assert_eq!(cancelled.invoice.status, InvoiceStatus::Cancelled);
        assert_eq!(cancelled.invoice.cancel_reason.as_deref(), Some("customer returned"));
        assert!(cancelled.invoice.cancelled_at.is_some());

        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 10_000);
        assert_eq!(stock_of(&fx, &fx.alcohol.id).await, 100_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 0);

        let movements = fx
            .ledger
            .movements()
            .by_invoice(&posted.invoice.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].kind, MovementKind::Cancellation);
        assert_eq!(movements[1].amount_cents, -10_000);
        assert_eq!(movements[1].balance_after_cents, 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_snapshot_not_current_formula() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        let posted = fx.engine.post_sale(&draft, "op-sale").await.unwrap();

        // Rework the formula after the sale.
        let mut edited = fx.formula.clone();
        edited.essence_mg_per_unit = 999;
        fx.ledger.formulas().update(&edited).await.unwrap();
        fx.ledger
            .formulas()
            .set_components(
                &fx.formula.id,
                &[ComponentSpec {
                    supply_id: fx.alcohol.id.clone(),
                    mg_per_unit: 9_999,
                }],
            )
            .await
            .unwrap();

        fx.engine
            .cancel_invoice(&posted.invoice.id, "mistake", fx.day, "op-cancel")
            .await
            .unwrap();

        // The original 700/1300 came back, not the edited doses.
        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 10_000);
        assert_eq!(stock_of(&fx, &fx.alcohol.id).await, 100_000);
    }

    #[tokio::test]
    async fn test_cancel_twice() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 1, PaymentMethod::Cash, 5_000);
        let posted = fx.engine.post_sale(&draft, "op-sale").await.unwrap();

        fx.engine
            .cancel_invoice(&posted.invoice.id, "returned", fx.day, "op-cancel")
            .await
            .unwrap();

        // A new key is an error: the invoice is no longer cancellable.
        let err = fx
            .engine
            .cancel_invoice(&posted.invoice.id, "again", fx.day, "op-other")
            .await
            .unwrap_err();
        assert!(
            matches!(err, LedgerError::AlreadyCancelled { ref invoice_no } if invoice_no == "000001")
        );

        // The original key replays its outcome.
        let replay = fx
            .engine
            .cancel_invoice(&posted.invoice.id, "returned", fx.day, "op-cancel")
            .await
            .unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.invoice.status, InvoiceStatus::Cancelled);

        // Stock was restored exactly once.
        assert_eq!(stock_of(&fx, &fx.jasmine.id).await, 10_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 0);
    }

    #[tokio::test]
    async fn test_open_register_twice_errors() {
        let fx = fixture().await;

        open_day(&fx).await;
        let err = fx
            .engine
            .open_register(fx.day, "Adam", &MethodAmounts::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegisterDayExists { .. }));

        // Closing does not make the day reopenable.
        fx.engine
            .close_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap();
        let err = fx
            .engine
            .open_register(fx.day, "Adam", &MethodAmounts::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegisterDayExists { .. }));
    }

    #[tokio::test]
    async fn test_close_register_reconciles_and_persists() {
        let fx = fixture().await;

        fx.engine
            .open_register(fx.day, "Marta", &MethodAmounts::from_cents(5_000, 0, 0))
            .await
            .unwrap();

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        fx.engine.post_sale(&draft, "s1").await.unwrap();
        fx.engine
            .deposit(PaymentMethod::Bank, Money::from_cents(2_000), fx.day, None, "d1")
            .await
            .unwrap();
        fx.engine
            .withdraw(
                PaymentMethod::Cash,
                Money::from_cents(3_000),
                fx.day,
                Some("supplier run"),
                "w1",
            )
            .await
            .unwrap();

        let closed = fx
            .engine
            .close_register(fx.day, "Marta", &MethodAmounts::from_cents(11_500, 2_000, 0))
            .await
            .unwrap();

        assert_eq!(closed.day.status, RegisterStatus::Closed);
        assert_eq!(closed.day.closed_by.as_deref(), Some("Marta"));

        // Cash: 5_000 float + (10_000 - 3_000) movements = 12_000
        // expected, 11_500 counted → 500 short.
        let cash = closed.report.line(PaymentMethod::Cash).unwrap();
        assert_eq!(cash.movement_cents, 7_000);
        assert_eq!(cash.expected_cents, 12_000);
        assert_eq!(cash.variance_cents, -500);

        let bank = closed.report.line(PaymentMethod::Bank).unwrap();
        assert_eq!(bank.expected_cents, 2_000);
        assert_eq!(bank.variance_cents, 0);

        assert!(!closed.report.is_balanced());
        assert_eq!(closed.report.variance_total().cents(), -500);

        // The report landed on the register lines.
        let day = fx.ledger.registers().get_day(fx.day).await.unwrap().unwrap();
        assert_eq!(day.status, RegisterStatus::Closed);
        let lines = fx.ledger.registers().get_lines(&day.id).await.unwrap();
        let cash_line = lines
            .iter()
            .find(|l| l.method == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash_line.opening_cents, 5_000);
        assert_eq!(cash_line.expected_cents, Some(12_000));
        assert_eq!(cash_line.counted_cents, Some(11_500));
        assert_eq!(cash_line.variance_cents, Some(-500));
    }

    #[tokio::test]
    async fn test_close_requires_open_day() {
        let fx = fixture().await;

        let err = fx
            .engine
            .close_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegisterNotOpen { .. }));

        open_day(&fx).await;
        fx.engine
            .close_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap();

        let err = fx
            .engine
            .close_register(fx.day, "Marta", &MethodAmounts::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegisterClosed { .. }));
    }

    #[tokio::test]
    async fn test_withdrawal_cannot_overdraw() {
        let fx = fixture().await;

        fx.engine
            .deposit(PaymentMethod::Cash, Money::from_cents(5_000), fx.day, None, "d1")
            .await
            .unwrap();

        let err = fx
            .engine
            .withdraw(PaymentMethod::Cash, Money::from_cents(6_000), fx.day, None, "w1")
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientFunds {
                method,
                needed_cents,
                available_cents,
            } => {
                assert_eq!(method, PaymentMethod::Cash);
                assert_eq!(needed_cents, 6_000);
                assert_eq!(available_cents, 5_000);
            }
            other => panic!("Expected InsufficientFunds, got {other:?}"),
        }

        // Down to exactly zero is fine; one cent past it is not.
        fx.engine
            .withdraw(PaymentMethod::Cash, Money::from_cents(5_000), fx.day, None, "w2")
            .await
            .unwrap();
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 0);

        let err = fx
            .engine
            .withdraw(PaymentMethod::Cash, Money::from_cents(1), fx.day, None, "w3")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_atomically() {
        let fx = fixture().await;

        fx.engine
            .deposit(PaymentMethod::Cash, Money::from_cents(10_000), fx.day, None, "d1")
            .await
            .unwrap();

        let transfer = fx
            .engine
            .transfer(
                PaymentMethod::Cash,
                PaymentMethod::Bank,
                Money::from_cents(4_000),
                fx.day,
                Some("bank drop"),
                "t1",
            )
            .await
            .unwrap();

        assert_eq!(transfer.outgoing.method, PaymentMethod::Cash);
        assert_eq!(transfer.outgoing.amount_cents, -4_000);
        assert_eq!(transfer.outgoing.balance_after_cents, 6_000);
        assert_eq!(transfer.incoming.method, PaymentMethod::Bank);
        assert_eq!(transfer.incoming.amount_cents, 4_000);
        assert_eq!(transfer.incoming.balance_after_cents, 4_000);
        assert_eq!(transfer.outgoing.op_key, transfer.incoming.op_key);

        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 6_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Bank).await, 4_000);
        assert_eq!(fx.ledger.wallets().total().await.unwrap().cents(), 10_000);

        // Same account on both sides is refused outright.
        let err = fx
            .engine
            .transfer(
                PaymentMethod::Cash,
                PaymentMethod::Cash,
                Money::from_cents(100),
                fx.day,
                None,
                "t2",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SameAccount { .. }));

        // An overdrawing transfer moves nothing on either side.
        let err = fx
            .engine
            .transfer(
                PaymentMethod::Bank,
                PaymentMethod::Transfer,
                Money::from_cents(999_999),
                fx.day,
                None,
                "t3",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(balance_of(&fx, PaymentMethod::Bank).await, 4_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Transfer).await, 0);
        assert!(fx.ledger.movements().by_op_key("t3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_replay_does_not_double_move() {
        let fx = fixture().await;

        fx.engine
            .deposit(PaymentMethod::Cash, Money::from_cents(10_000), fx.day, None, "d1")
            .await
            .unwrap();
        fx.engine
            .transfer(
                PaymentMethod::Cash,
                PaymentMethod::Bank,
                Money::from_cents(4_000),
                fx.day,
                None,
                "t1",
            )
            .await
            .unwrap();

        let replay = fx
            .engine
            .transfer(
                PaymentMethod::Cash,
                PaymentMethod::Bank,
                Money::from_cents(4_000),
                fx.day,
                None,
                "t1",
            )
            .await
            .unwrap();

        assert!(replay.replayed);
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 6_000);
        assert_eq!(balance_of(&fx, PaymentMethod::Bank).await, 4_000);
        assert_eq!(fx.ledger.movements().by_op_key("t1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_day_summary_breaks_down_by_kind() {
        let fx = fixture().await;
        open_day(&fx).await;

        let draft = perfume_draft(&fx, 2, PaymentMethod::Cash, 10_000);
        fx.engine.post_sale(&draft, "s1").await.unwrap();
        fx.engine
            .deposit(PaymentMethod::Bank, Money::from_cents(2_000), fx.day, None, "d1")
            .await
            .unwrap();
        fx.engine
            .withdraw(PaymentMethod::Cash, Money::from_cents(3_000), fx.day, None, "w1")
            .await
            .unwrap();
        fx.engine
            .transfer(
                PaymentMethod::Cash,
                PaymentMethod::Bank,
                Money::from_cents(1_000),
                fx.day,
                None,
                "t1",
            )
            .await
            .unwrap();

        let summary = fx.ledger.movements().day_summary(fx.day).await.unwrap();
        assert_eq!(summary.day_key, "24_08_2026");

        let cash = summary.line(PaymentMethod::Cash).unwrap();
        assert_eq!(cash.sales_cents, 10_000);
        assert_eq!(cash.withdrawals_cents, -3_000);
        assert_eq!(cash.transfers_cents, -1_000);
        assert_eq!(cash.net_cents, 6_000);

        let bank = summary.line(PaymentMethod::Bank).unwrap();
        assert_eq!(bank.deposits_cents, 2_000);
        assert_eq!(bank.transfers_cents, 1_000);
        assert_eq!(bank.net_cents, 3_000);

        let transfer = summary.line(PaymentMethod::Transfer).unwrap();
        assert_eq!(transfer.net_cents, 0);

        assert_eq!(summary.net_total().cents(), 9_000);
    }

    #[tokio::test]
    async fn test_movement_chain_tracks_balances() {
        let fx = fixture().await;

        fx.engine
            .deposit(PaymentMethod::Cash, Money::from_cents(1_000), fx.day, None, "d1")
            .await
            .unwrap();
        fx.engine
            .deposit(PaymentMethod::Cash, Money::from_cents(2_000), fx.day, None, "d2")
            .await
            .unwrap();

        let chain = fx
            .ledger
            .movements()
            .list_day_method(fx.day, PaymentMethod::Cash)
            .await
            .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].balance_after_cents, 1_000);
        assert_eq!(chain[1].balance_after_cents, 3_000);

        // The account agrees with the last journal row.
        assert_eq!(balance_of(&fx, PaymentMethod::Cash).await, 3_000);

        let latest = fx.ledger.movements().recent(1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, chain[1].id);
    }
}
