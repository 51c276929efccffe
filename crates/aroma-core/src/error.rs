//! # Error Types
//!
//! Domain-specific error types for aroma-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  aroma-core errors (this file)                                         │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  aroma-ledger errors (separate crate)                                  │
//! │  └── LedgerError      - Persistence and transaction failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations raised by pure
/// logic (draft validation, consumption planning). They should be
/// caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale draft was submitted with no lines.
    #[error("Sale has no lines")]
    EmptySale,

    /// The payments attached to a sale do not cover its total exactly.
    ///
    /// ## User Workflow
    /// ```text
    /// Lines total: $50.00
    ///      │
    ///      ▼
    /// Payments: $30.00 cash + $15.00 bank = $45.00
    ///      │
    ///      ▼
    /// PaymentMismatch { total_cents: 5000, paid_cents: 4500 }
    ///      │
    ///      ▼
    /// UI shows: "Payments are $5.00 short"
    /// ```
    #[error("Payments total {paid_cents} cents does not match sale total {total_cents} cents")]
    PaymentMismatch { total_cents: i64, paid_cents: i64 },

    /// Sale draft has exceeded maximum allowed lines.
    #[error("Sale cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A product's formula calls for essence but the product links none.
    ///
    /// ## When This Occurs
    /// - Catalog data was imported with a formula but no essence
    /// - The essence link was cleared after the product was created
    #[error("Product {sku} requires an essence but none is linked")]
    MissingEssence { sku: String },

    /// A payment method string did not match any known method.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid day key).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate supply in a component list).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
