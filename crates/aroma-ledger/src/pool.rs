//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Connection Pool                             │
//! │                                                                         │
//! │  App Startup                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Ledger::new(config).await ← Pool + migrations + wallet bootstrap       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                            │
//! │  │            SqlitePool                   │                            │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐        │                            │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...    │  (max_connections)         │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘        │                            │
//! │  └─────────────────────────────────────────┘                            │
//! │       │                                                                 │
//! │       ├──► ledger.products().get_by_sku(...)   (repositories)           │
//! │       └──► ledger.engine().post_sale(...)      (atomic operations)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block writers
//! - Better crash recovery
//!
//! A busy timeout is set on every connection so short write contention
//! waits instead of failing; contention that outlives the timeout
//! surfaces as [`LedgerError::Busy`] and the engine retries it.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use aroma_core::PaymentMethod;

use crate::engine::LedgerEngine;
use crate::error::{LedgerError, LedgerResult};
use crate::migrations;
use crate::repository::employee::EmployeeRepository;
use crate::repository::formula::FormulaRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::movement::MovementRepository;
use crate::repository::product::ProductRepository;
use crate::repository::register::RegisterRepository;
use crate::repository::supply::SupplyRepository;
use crate::repository::wallet::WalletRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/aroma.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5 (sufficient for a single-shop POS)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a connection waits on a locked database before
    /// reporting SQLITE_BUSY.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations (and the wallet bootstrap) on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created on first connect if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let ledger = Ledger::new(DbConfig::in_memory()).await?;
    /// // Fully isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires a single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    /// Builds a configuration from `AROMA_DB_*` environment variables.
    ///
    /// ## Variables
    /// - `AROMA_DB_PATH` - database file path (default `./aroma_pos.db`)
    /// - `AROMA_DB_MAX_CONNECTIONS` - pool size
    /// - `AROMA_DB_BUSY_TIMEOUT_MS` - busy timeout in milliseconds
    pub fn from_env() -> Self {
        let path =
            std::env::var("AROMA_DB_PATH").unwrap_or_else(|_| "./aroma_pos.db".to_string());

        let mut config = DbConfig::new(path);

        if let Ok(max) = std::env::var("AROMA_DB_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.max_connections = max;
            }
        }

        if let Ok(ms) = std::env::var("AROMA_DB_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.busy_timeout = Duration::from_millis(ms);
            }
        }

        config
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Main database handle providing repository and engine access.
///
/// Cloning is cheap: all clones share one connection pool.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = Ledger::new(DbConfig::new("./aroma.db")).await?;
///
/// // Catalog reads and CRUD go through repositories:
/// let product = ledger.products().get_by_sku("PRF-001").await?;
///
/// // Everything that moves money or stock goes through the engine:
/// let posted = ledger.engine().post_sale(&draft, "op-8f2a").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Ledger {
    /// Creates a new ledger handle.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite for a local POS workload:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    ///    - Busy timeout so writers wait instead of failing fast
    /// 3. Creates the connection pool
    /// 4. Runs migrations and ensures one wallet account per payment
    ///    method (if `run_migrations` is enabled)
    pub async fn new(config: DbConfig) -> LedgerResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing ledger database"
        );

        // sqlite://path with mode=rwc creates the file if missing
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| LedgerError::ConnectionFailed(e.to_string()))?
            // WAL mode: readers don't block the single writer
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL synchronous: safe from corruption, may lose the
            // last transaction on power loss
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with foreign keys off for compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| LedgerError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Ledger pool created"
        );

        let ledger = Ledger { pool };

        if config.run_migrations {
            ledger.run_migrations().await?;
            ledger.ensure_wallet_accounts().await?;
        }

        Ok(ledger)
    }

    /// Runs database migrations.
    ///
    /// Automatically called by `new()` unless migrations were disabled
    /// in the config; idempotent either way.
    pub async fn run_migrations(&self) -> LedgerResult<()> {
        info!("Running ledger migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Ensures one wallet account row exists per payment method.
    ///
    /// The wallet is a fixed set of balances; operations update these
    /// rows rather than creating them, so they must exist up front.
    /// Idempotent.
    pub async fn ensure_wallet_accounts(&self) -> LedgerResult<()> {
        let now = Utc::now();

        for method in PaymentMethod::ALL {
            sqlx::query(
                "INSERT OR IGNORE INTO wallet_accounts (method, balance_cents, updated_at) \
                 VALUES (?1, 0, ?2)",
            )
            .bind(method)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        debug!("Wallet accounts ensured");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For advanced queries not covered by repositories. Prefer the
    /// repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the transactional ledger engine.
    ///
    /// Every operation that moves money or stock goes through here.
    pub fn engine(&self) -> LedgerEngine {
        LedgerEngine::new(self.pool.clone())
    }

    /// Returns the employee repository.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository::new(self.pool.clone())
    }

    /// Returns the supply repository.
    pub fn supplies(&self) -> SupplyRepository {
        SupplyRepository::new(self.pool.clone())
    }

    /// Returns the formula repository.
    pub fn formulas(&self) -> FormulaRepository {
        FormulaRepository::new(self.pool.clone())
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the invoice repository.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Returns the register repository.
    pub fn registers(&self) -> RegisterRepository {
        RegisterRepository::new(self.pool.clone())
    }

    /// Returns the wallet repository.
    pub fn wallets(&self) -> WalletRepository {
        WalletRepository::new(self.pool.clone())
    }

    /// Returns the movement repository.
    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository and engine operations fail.
    pub async fn close(&self) {
        info!("Closing ledger connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
