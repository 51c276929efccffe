//! # Ledger Error Types
//!
//! Error types for every persistence and engine operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain rule broken                 │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  Classified by From<sqlx::Error>     Typed variant                      │
//! │  (unique / FK / busy / not-found)    (InsufficientStock, ...)           │
//! │       │                                   │                             │
//! │       └───────────────┬───────────────────┘                             │
//! │                       ▼                                                 │
//! │                 LedgerError ← one taxonomy, nothing swallowed           │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │            Caller decides presentation                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use aroma_core::{CoreError, PaymentMethod};

/// Ledger operation errors.
///
/// Infrastructure variants wrap sqlx errors; domain variants describe
/// exactly why an operation refused to post.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entity not found in the database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Duplicate invoice number
    /// - Replaying an operation key that lost a race (handled internally)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Draft or input validation failed in pure domain code.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A supply cannot cover the consumption a sale needs.
    ///
    /// The whole sale aborts; no partial debit survives.
    #[error("Insufficient stock for {sku}: need {needed_mg} mg, have {available_mg} mg")]
    InsufficientStock {
        sku: String,
        needed_mg: i64,
        available_mg: i64,
    },

    /// A wallet account cannot cover a debit.
    ///
    /// Raised by withdrawals and transfers; never by cancellations,
    /// which are allowed to drive a balance negative.
    #[error("Insufficient funds in {method}: need {needed_cents} cents, have {available_cents} cents")]
    InsufficientFunds {
        method: PaymentMethod,
        needed_cents: i64,
        available_cents: i64,
    },

    /// No open register exists for the business day.
    #[error("Register for {day_key} is not open")]
    RegisterNotOpen { day_key: String },

    /// The business day already has a register record (open or closed).
    #[error("Register for {day_key} already exists")]
    RegisterDayExists { day_key: String },

    /// The register day was already closed.
    #[error("Register for {day_key} is already closed")]
    RegisterClosed { day_key: String },

    /// Cancelling an invoice that was already cancelled under a
    /// different operation key.
    #[error("Invoice {invoice_no} is already cancelled")]
    AlreadyCancelled { invoice_no: String },

    /// Entity exists but was deactivated.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// A wallet transfer named the same account on both sides.
    #[error("Transfer needs two distinct accounts, got {method} twice")]
    SameAccount { method: PaymentMethod },

    /// An operation key was replayed with a different operation kind.
    #[error("Operation key '{op_key}' was already used for a {existing_kind} operation")]
    OpKeyConflict { op_key: String, existing_kind: String },

    /// SQLITE_BUSY surfaced past the busy timeout.
    ///
    /// The engine retries these with backoff; see [`LedgerError::is_busy`].
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal ledger error.
    #[error("Internal ledger error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an Inactive error for a given entity type and ID.
    pub fn inactive(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::Inactive {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether this failure is transient lock contention worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(self, LedgerError::Busy(_))
    }
}

/// Convert sqlx errors to LedgerError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → LedgerError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / busy
/// sqlx::Error::PoolTimedOut   → LedgerError::PoolExhausted
/// Other                       → LedgerError::Internal
/// ```
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LedgerError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                // FK:     "FOREIGN KEY constraint failed"
                // BUSY:   "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    LedgerError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    LedgerError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    LedgerError::Busy(msg.to_string())
                } else {
                    LedgerError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => LedgerError::PoolExhausted,

            sqlx::Error::PoolClosed => LedgerError::ConnectionFailed("Pool is closed".to_string()),

            _ => LedgerError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        LedgerError::MigrationFailed(err.to_string())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
