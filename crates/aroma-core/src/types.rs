//! # Domain Types
//!
//! Core domain types used throughout Aroma POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Invoice     │   │    Movement     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  invoice_no     │   │  method         │       │
//! │  │  price_cents    │   │  day_key        │   │  amount_cents   │       │
//! │  │  formula_id?    │   │  status         │   │  kind           │       │
//! │  │  essence_id?    │   │  total_cents    │   │  balance_after  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Supply      │   │   RegisterDay   │   │  WalletAccount  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  kind           │   │  day_key        │   │  method (PK)    │       │
//! │  │  stock_mg       │   │  status         │   │  balance_cents  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_no, day_key, etc.) - human-readable
//!
//! ## Day Keys
//! Business days are addressed by `dd_mm_yyyy` strings (`24_08_2026`),
//! the format the shop's paper books always used. Register days and
//! invoices carry one; movements carry the day they were posted on.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Money;
use crate::quantity::Grams;

// =============================================================================
// Day Keys
// =============================================================================

/// Chrono format string behind `dd_mm_yyyy` day keys.
const DAY_KEY_FORMAT: &str = "%d_%m_%Y";

/// Formats a business date as a `dd_mm_yyyy` day key.
///
/// ## Example
/// ```rust
/// use aroma_core::types::day_key;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
/// assert_eq!(day_key(date), "24_08_2026");
/// ```
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

/// Parses a `dd_mm_yyyy` day key back into a date.
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()
}

// =============================================================================
// Payment Method
// =============================================================================

/// A payment method, doubling as the wallet account it settles into.
///
/// The wallet is a fixed set of named balances, one per method.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash in the drawer.
    Cash,
    /// Card/bank settlement account.
    Bank,
    /// Direct transfer account.
    Transfer,
}

impl PaymentMethod {
    /// All methods, in reporting order.
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Cash,
        PaymentMethod::Bank,
        PaymentMethod::Transfer,
    ];

    /// Stable lowercase name, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "bank" => Ok(PaymentMethod::Bank),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(CoreError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Supply Kind
// =============================================================================

/// The role a raw material plays in perfume formulas.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyKind {
    Alcohol,
    /// Scent concentrate; the supply a product's `essence_id` points at.
    Essence,
    Fixative,
    Pheromone,
    /// Packaging, bottles, anything not consumed by formula ratios.
    Other,
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The status of a posted invoice.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Sale committed: stock debited, wallet credited.
    Posted,
    /// Compensated: stock restored, payments reversed.
    Cancelled,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Posted
    }
}

// =============================================================================
// Register Status
// =============================================================================

/// The lifecycle of a cash-register day.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterStatus {
    Open,
    Closed,
}

// =============================================================================
// Movement Kind
// =============================================================================

/// What caused a wallet movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Sale payment credited to a wallet account.
    Sale,
    /// Compensating reversal of a sale payment.
    Cancellation,
    /// Manual deposit (ingreso).
    Deposit,
    /// Manual withdrawal (retiro).
    Withdrawal,
    /// Incoming side of a wallet transfer.
    TransferIn,
    /// Outgoing side of a wallet transfer.
    TransferOut,
}

// =============================================================================
// Employee
// =============================================================================

/// A staff member who can open registers and post sales.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on invoices (snapshotted there).
    pub full_name: String,

    /// Whether the employee is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Supply
// =============================================================================

/// A raw material with gram-denominated stock (essences, alcohol,
/// fixatives, pheromones).
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier, unique.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Role in formulas.
    pub kind: SupplyKind,

    /// Current stock in milligrams.
    pub stock_mg: i64,

    /// Whether the supply is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supply {
    /// Returns the current stock as a quantity.
    #[inline]
    pub fn stock(&self) -> Grams {
        Grams::from_milligrams(self.stock_mg)
    }

    /// Checks whether this supply can cover a consumption.
    pub fn can_consume(&self, needed: Grams) -> bool {
        self.stock_mg >= needed.milligrams()
    }
}

// =============================================================================
// Formula
// =============================================================================

/// A recipe shared by products: per-unit essence grams plus fixed
/// ratios of other raw materials.
///
/// The essence itself is chosen per product (`Product::essence_id`);
/// the formula only says how much of it a unit takes.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique ("EDP 50ml").
    pub name: String,

    /// Essence consumed per finished unit, in milligrams.
    pub essence_mg_per_unit: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Formula {
    /// Returns the per-unit essence consumption as a quantity.
    #[inline]
    pub fn essence_per_unit(&self) -> Grams {
        Grams::from_milligrams(self.essence_mg_per_unit)
    }
}

/// One non-essence ingredient of a formula: a supply and how many
/// milligrams of it one finished unit consumes.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaComponent {
    pub formula_id: String,
    pub supply_id: String,
    pub mg_per_unit: i64,
}

impl FormulaComponent {
    /// Returns the per-unit consumption as a quantity.
    #[inline]
    pub fn per_unit(&self) -> Grams {
        Grams::from_milligrams(self.mg_per_unit)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A finished product available for sale.
///
/// Products with a formula consume raw-material stock when sold;
/// products without one (resale items) consume nothing.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Display name shown to cashier and on invoices.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Recipe this product is mixed from, if any.
    pub formula_id: Option<String>,

    /// The essence supply this product's scent comes from, if any.
    pub essence_id: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if selling this product consumes raw-material stock.
    #[inline]
    pub fn consumes_stock(&self) -> bool {
        self.formula_id.is_some()
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A posted sale.
///
/// Lives under a business day (`day_key`) and carries a zero-padded
/// sequential `invoice_no`, like the per-day invoice books it replaces.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,

    /// Zero-padded sequential number ("000042"), unique.
    pub invoice_no: String,

    /// Business day this sale belongs to (`dd_mm_yyyy`).
    pub day_key: String,

    pub status: InvoiceStatus,

    /// Selling employee (reference plus frozen name).
    pub employee_id: String,
    pub employee_name: String,

    /// Grand total in cents; always equals the sum of line totals
    /// and the sum of payments.
    pub total_cents: i64,

    pub note: Option<String>,

    pub posted_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Invoice {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks whether this invoice can still be cancelled.
    #[inline]
    pub fn can_cancel(&self) -> bool {
        self.status == InvoiceStatus::Posted
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// A line item on an invoice.
/// Uses snapshot pattern to freeze product data at time of sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Units sold.
    pub quantity: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
}

impl InvoiceLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Invoice Payment
// =============================================================================

/// A payment towards an invoice.
/// An invoice can carry multiple payments for split tender.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub id: String,
    pub invoice_id: String,
    pub method: PaymentMethod,
    /// Amount paid in cents.
    pub amount_cents: i64,
}

impl InvoicePayment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Consumption Entry
// =============================================================================

/// One row of an invoice's consumption snapshot: how many milligrams
/// of a supply the sale actually debited.
///
/// Cancellation restores exactly these rows, so later formula edits
/// can never skew a reversal.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub invoice_id: String,
    pub supply_id: String,
    pub consumed_mg: i64,
}

impl ConsumptionEntry {
    /// Returns the consumed mass as a quantity.
    #[inline]
    pub fn consumed(&self) -> Grams {
        Grams::from_milligrams(self.consumed_mg)
    }
}

// =============================================================================
// Wallet Account
// =============================================================================

/// A named payment-method balance (cash, bank, transfer).
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    /// The method is the account identity; there is exactly one row
    /// per method.
    pub method: PaymentMethod,

    /// Current balance in cents.
    pub balance_cents: i64,

    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// Returns the balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Checks whether this account can cover a debit.
    pub fn can_debit(&self, amount: Money) -> bool {
        self.balance_cents >= amount.cents()
    }
}

// =============================================================================
// Movement
// =============================================================================

/// A signed entry in the monetary ledger.
///
/// Every operation that touches a wallet account appends one of these
/// in the same transaction; register reconciliation sums them per day
/// and method.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: String,

    /// Business day the movement was posted on (`dd_mm_yyyy`).
    pub day_key: String,

    /// Wallet account this movement hit.
    pub method: PaymentMethod,

    /// Signed amount in cents: credits positive, debits negative.
    pub amount_cents: i64,

    /// Account balance after applying this movement.
    pub balance_after_cents: i64,

    pub kind: MovementKind,

    /// Invoice behind a sale/cancellation movement.
    pub invoice_id: Option<String>,

    /// Idempotency key of the operation that produced this movement.
    pub op_key: Option<String>,

    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Returns the signed amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Returns the post-movement balance as Money.
    #[inline]
    pub fn balance_after(&self) -> Money {
        Money::from_cents(self.balance_after_cents)
    }
}

// =============================================================================
// Register Day
// =============================================================================

/// A cash-register day record: one per business day.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDay {
    pub id: String,

    /// Business day (`dd_mm_yyyy`), unique.
    pub day_key: String,

    pub status: RegisterStatus,

    pub opened_by: String,
    pub opened_at: DateTime<Utc>,

    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RegisterDay {
    /// Checks whether the day still accepts sales.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }
}

/// Per-method amounts of a register day: opening float, and after
/// close the counted / expected / variance triple.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLine {
    pub day_id: String,
    pub method: PaymentMethod,

    /// Opening float in cents.
    pub opening_cents: i64,

    /// Expected at close: opening + signed movements of the day.
    pub expected_cents: Option<i64>,

    /// Physically counted at close.
    pub counted_cents: Option<i64>,

    /// counted - expected.
    pub variance_cents: Option<i64>,
}

impl RegisterLine {
    /// Returns the opening float as Money.
    #[inline]
    pub fn opening(&self) -> Money {
        Money::from_cents(self.opening_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
