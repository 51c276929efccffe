//! # Supply Repository
//!
//! Database operations for raw materials (essences, alcohol, fixatives,
//! pheromones).
//!
//! ## Stock Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Who May Touch stock_mg                             │
//! │                                                                         │
//! │  Sales / cancellations   → the ledger engine, inside its own            │
//! │                            transaction (never through here)             │
//! │  Restocking a delivery   → restock() (positive credit)                  │
//! │  Shrinkage, spills,      → adjust_stock() (signed, with a reason        │
//! │  count corrections         that lands in the log)                       │
//! │                                                                         │
//! │  update() deliberately cannot change stock_mg.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use aroma_core::validation::{validate_name, validate_restock_mg, validate_sku};
use aroma_core::{CoreError, Grams, Supply, SupplyKind};

use crate::error::{LedgerError, LedgerResult};

const SELECT_SUPPLY: &str =
    "SELECT id, sku, name, kind, stock_mg, is_active, created_at, updated_at FROM supplies";

/// Repository for supply database operations.
#[derive(Debug, Clone)]
pub struct SupplyRepository {
    pool: SqlitePool,
}

impl SupplyRepository {
    /// Creates a new SupplyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplyRepository { pool }
    }

    /// Inserts a new supply.
    ///
    /// ## Returns
    /// * `Err(LedgerError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, supply: &Supply) -> LedgerResult<()> {
        validate_sku(&supply.sku).map_err(CoreError::from)?;
        validate_name(&supply.name).map_err(CoreError::from)?;

        debug!(sku = %supply.sku, "Inserting supply");

        sqlx::query(
            "INSERT INTO supplies (id, sku, name, kind, stock_mg, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&supply.id)
        .bind(&supply.sku)
        .bind(&supply.name)
        .bind(supply.kind)
        .bind(supply.stock_mg)
        .bind(supply.is_active)
        .bind(supply.created_at)
        .bind(supply.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a supply by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Supply>> {
        let supply = sqlx::query_as::<_, Supply>(&format!("{SELECT_SUPPLY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supply)
    }

    /// Gets a supply by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> LedgerResult<Option<Supply>> {
        let supply = sqlx::query_as::<_, Supply>(&format!("{SELECT_SUPPLY} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supply)
    }

    /// Lists active supplies, sorted by SKU.
    pub async fn list_active(&self) -> LedgerResult<Vec<Supply>> {
        let supplies = sqlx::query_as::<_, Supply>(&format!(
            "{SELECT_SUPPLY} WHERE is_active = 1 ORDER BY sku"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(supplies)
    }

    /// Lists active supplies of one kind, sorted by SKU.
    pub async fn list_by_kind(&self, kind: SupplyKind) -> LedgerResult<Vec<Supply>> {
        let supplies = sqlx::query_as::<_, Supply>(&format!(
            "{SELECT_SUPPLY} WHERE kind = ?1 AND is_active = 1 ORDER BY sku"
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(supplies)
    }

    /// Updates a supply's descriptive fields.
    ///
    /// Stock is out of reach here; use [`SupplyRepository::restock`] or
    /// [`SupplyRepository::adjust_stock`].
    pub async fn update(&self, supply: &Supply) -> LedgerResult<()> {
        validate_sku(&supply.sku).map_err(CoreError::from)?;
        validate_name(&supply.name).map_err(CoreError::from)?;

        debug!(id = %supply.id, "Updating supply");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE supplies SET sku = ?2, name = ?3, kind = ?4, is_active = ?5, updated_at = ?6 \
             WHERE id = ?1",
        )
        .bind(&supply.id)
        .bind(&supply.sku)
        .bind(&supply.name)
        .bind(supply.kind)
        .bind(supply.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Supply", &supply.id));
        }

        Ok(())
    }

    /// Credits stock from a delivery.
    ///
    /// ## Arguments
    /// * `amount` - must be positive
    pub async fn restock(&self, id: &str, amount: Grams) -> LedgerResult<()> {
        validate_restock_mg(amount.milligrams()).map_err(CoreError::from)?;

        debug!(id = %id, amount = %amount, "Restocking supply");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE supplies SET stock_mg = stock_mg + ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(amount.milligrams())
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Supply", id));
        }

        Ok(())
    }

    /// Applies a signed manual stock correction (count fixes, spills,
    /// shrinkage write-offs).
    ///
    /// The reason goes to the structured log; stock can never be
    /// adjusted below zero.
    pub async fn adjust_stock(&self, id: &str, delta: Grams, reason: &str) -> LedgerResult<()> {
        let supply = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Supply", id))?;

        if supply.stock_mg + delta.milligrams() < 0 {
            return Err(LedgerError::InsufficientStock {
                sku: supply.sku,
                needed_mg: delta.abs().milligrams(),
                available_mg: supply.stock_mg,
            });
        }

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE supplies SET stock_mg = stock_mg + ?2, updated_at = ?3 \
             WHERE id = ?1 AND stock_mg + ?2 >= 0",
        )
        .bind(id)
        .bind(delta.milligrams())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race with a sale; the guard clause held.
            return Err(LedgerError::InsufficientStock {
                sku: supply.sku,
                needed_mg: delta.abs().milligrams(),
                available_mg: supply.stock_mg,
            });
        }

        info!(
            id = %id,
            sku = %supply.sku,
            delta_mg = delta.milligrams(),
            reason = %reason,
            "Supply stock adjusted"
        );

        Ok(())
    }

    /// Deactivates a supply.
    ///
    /// Historic consumption snapshots keep referencing it.
    pub async fn deactivate(&self, id: &str) -> LedgerResult<()> {
        debug!(id = %id, "Deactivating supply");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE supplies SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Supply", id));
        }

        Ok(())
    }

    /// Counts active supplies.
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supplies WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
