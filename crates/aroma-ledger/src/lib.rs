//! # aroma-ledger: Persistence & Transaction Layer for Aroma POS
//!
//! This crate owns the SQLite database of the perfume shop POS: the
//! connection pool, the embedded migrations, the repositories, and the
//! ledger engine that executes every money- or stock-affecting
//! operation in one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aroma POS Data Flow                              │
//! │                                                                         │
//! │  Caller (UI command, API handler, seed tool)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    aroma-ledger (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐  │   │
//! │  │   │    Ledger    │   │ Repositories │   │   LedgerEngine    │  │   │
//! │  │   │   (pool.rs)  │   │ (catalog     │   │ sale / cancel /   │  │   │
//! │  │   │              │   │  reads &     │   │ register / wallet │  │   │
//! │  │   │ SqlitePool   │◄──│  writes,     │   │ one transaction   │  │   │
//! │  │   │ Migrations   │   │ ledger reads)│   │ per operation     │  │   │
//! │  │   └──────────────┘   └──────────────┘   └───────────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        SQLite Database (WAL mode, foreign keys enforced)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Business math (money, grams, consumption plans, reconciliation)       │
//! │  lives in aroma-core; this crate persists its decisions.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, configuration and startup
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Ledger error types
//! - [`repository`] - Catalog and ledger-state repositories
//! - [`engine`] - Atomic sale / cancel / register / wallet operations
//! - [`sequence`] - Gap-free invoice numbering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aroma_ledger::{DbConfig, Ledger};
//!
//! // Open the database; migrations and wallet bootstrap run here
//! let config = DbConfig::new("path/to/aroma.db");
//! let ledger = Ledger::new(config).await?;
//!
//! // Catalog access goes through repositories
//! let hits = ledger.products().search("jasmine", 20).await?;
//!
//! // Anything touching money or stock goes through the engine
//! let posted = ledger.engine().post_sale(&draft, "op-7421").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequence;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{LedgerError, LedgerResult};
pub use pool::{DbConfig, Ledger};

pub use engine::{
    CancelledSale, ClosedDay, LedgerEngine, PostedSale, WalletTransfer, WalletUpdate,
};
pub use migrations::MigrationStatus;
pub use sequence::format_invoice_no;

// Repository re-exports for convenience
pub use repository::employee::EmployeeRepository;
pub use repository::formula::FormulaRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::movement::{DaySummary, DaySummaryLine, MovementRepository};
pub use repository::product::ProductRepository;
pub use repository::register::RegisterRepository;
pub use repository::supply::SupplyRepository;
pub use repository::wallet::WalletRepository;
