//! # aroma-core: Pure Business Logic for Aroma POS
//!
//! This crate is the **heart** of Aroma POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aroma POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                        Callers                                  │   │
//! │  │    Cashier flow ──► Back office ──► Reports ──► Seeding        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aroma-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │  │  types  │ │  money  │ │ quantity │ │ formula │ │register │ │   │
//! │  │  │ Invoice │ │  Money  │ │  Grams   │ │ Consum. │ │Reconcile│ │   │
//! │  │  │ Supply  │ │ (cents) │ │   (mg)   │ │  Plan   │ │  math   │ │   │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └─────────┘ └─────────┘ │   │
//! │  │                    ┌─────────┐ ┌────────────┐                  │   │
//! │  │                    │  sale   │ │ validation │                  │   │
//! │  │                    │  Draft  │ │   rules    │                  │   │
//! │  │                    └─────────┘ └────────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 aroma-ledger (Persistence Layer)                │   │
//! │  │      SQLite repositories + the transactional ledger engine      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Supply, Invoice, Movement, etc.)
//! - [`money`] - Money type with integer cents arithmetic (no floating point!)
//! - [`quantity`] - Grams type with integer milligram arithmetic
//! - [`formula`] - Raw-material consumption planning for sales
//! - [`sale`] - Sale drafts and their validation
//! - [`register`] - Register-day reconciliation math
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Units**: Money is cents (i64), stock is milligrams (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use aroma_core::money::Money;
//! use aroma_core::quantity::Grams;
//!
//! // Create money from cents (never from floats!)
//! let price = Money::from_cents(2990); // $29.90
//! assert_eq!(price.multiply_quantity(3).cents(), 8970);
//!
//! // Stock math is exact in milligrams
//! let per_unit = Grams::from_milligrams(350); // 0.350 g essence per bottle
//! assert_eq!(per_unit.multiply_quantity(1000), Grams::from_grams(350));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod formula;
pub mod money;
pub mod quantity;
pub mod register;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use aroma_core::Money` instead of
// `use aroma_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use formula::{ComponentSpec, Composition, ConsumptionPlan};
pub use money::Money;
pub use quantity::Grams;
pub use register::{reconcile, MethodAmounts, ReconcileLine, ReconcileReport};
pub use sale::{DraftLine, DraftPayment, SaleDraft};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single sale
///
/// ## Business Reason
/// Prevents runaway drafts and keeps invoices printable on one page.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single product on one line
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Width of zero-padded invoice numbers ("000042")
///
/// Matches the shop's historical numbering; six digits outlive any
/// realistic sale volume before a renumbering would be needed.
pub const INVOICE_NO_WIDTH: usize = 6;
