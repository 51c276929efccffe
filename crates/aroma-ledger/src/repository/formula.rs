//! # Formula Repository
//!
//! Database operations for perfume formulas and their component lists.
//!
//! A formula row carries the per-unit essence dose; `formula_components`
//! rows carry the per-unit doses of every other supply (alcohol,
//! fixative, pheromone). Component edits never touch history: posted
//! invoices keep their own consumption snapshots.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use aroma_core::validation::{validate_components, validate_name, validate_per_unit_mg};
use aroma_core::{ComponentSpec, Composition, CoreError, Formula, FormulaComponent};

use crate::error::{LedgerError, LedgerResult};

const SELECT_FORMULA: &str =
    "SELECT id, name, essence_mg_per_unit, created_at, updated_at FROM formulas";

const SELECT_COMPONENTS: &str =
    "SELECT formula_id, supply_id, mg_per_unit FROM formula_components";

/// Repository for formula database operations.
#[derive(Debug, Clone)]
pub struct FormulaRepository {
    pool: SqlitePool,
}

impl FormulaRepository {
    /// Creates a new FormulaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FormulaRepository { pool }
    }

    /// Inserts a formula together with its component list.
    ///
    /// Both land in one transaction so a half-written formula can never
    /// be picked up by a sale.
    pub async fn insert(&self, formula: &Formula, components: &[ComponentSpec]) -> LedgerResult<()> {
        validate_name(&formula.name).map_err(CoreError::from)?;
        validate_per_unit_mg(formula.essence_mg_per_unit).map_err(CoreError::from)?;
        validate_components(components).map_err(CoreError::from)?;

        debug!(name = %formula.name, components = components.len(), "Inserting formula");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO formulas (id, name, essence_mg_per_unit, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&formula.id)
        .bind(&formula.name)
        .bind(formula.essence_mg_per_unit)
        .bind(formula.created_at)
        .bind(formula.updated_at)
        .execute(&mut *tx)
        .await?;

        for component in components {
            sqlx::query(
                "INSERT INTO formula_components (formula_id, supply_id, mg_per_unit) \
                 VALUES (?1, ?2, ?3)",
            )
            .bind(&formula.id)
            .bind(&component.supply_id)
            .bind(component.mg_per_unit)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Gets a formula by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Formula>> {
        let formula = sqlx::query_as::<_, Formula>(&format!("{SELECT_FORMULA} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(formula)
    }

    /// Gets a formula with its component list.
    pub async fn get_composition(&self, id: &str) -> LedgerResult<Option<Composition>> {
        let Some(formula) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let components = sqlx::query_as::<_, FormulaComponent>(&format!(
            "{SELECT_COMPONENTS} WHERE formula_id = ?1 ORDER BY supply_id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Composition {
            formula,
            components,
        }))
    }

    /// Lists all formulas, sorted by name.
    pub async fn list(&self) -> LedgerResult<Vec<Formula>> {
        let formulas = sqlx::query_as::<_, Formula>(&format!("{SELECT_FORMULA} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(formulas)
    }

    /// Updates a formula's name and essence dose.
    pub async fn update(&self, formula: &Formula) -> LedgerResult<()> {
        validate_name(&formula.name).map_err(CoreError::from)?;
        validate_per_unit_mg(formula.essence_mg_per_unit).map_err(CoreError::from)?;

        debug!(id = %formula.id, "Updating formula");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE formulas SET name = ?2, essence_mg_per_unit = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(&formula.id)
        .bind(&formula.name)
        .bind(formula.essence_mg_per_unit)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Formula", &formula.id));
        }

        Ok(())
    }

    /// Replaces a formula's component list.
    ///
    /// Only affects future sales.
    pub async fn set_components(
        &self,
        formula_id: &str,
        components: &[ComponentSpec],
    ) -> LedgerResult<()> {
        validate_components(components).map_err(CoreError::from)?;

        debug!(id = %formula_id, components = components.len(), "Replacing formula components");

        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM formulas WHERE id = ?1")
            .bind(formula_id)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_none() {
            return Err(LedgerError::not_found("Formula", formula_id));
        }

        sqlx::query("DELETE FROM formula_components WHERE formula_id = ?1")
            .bind(formula_id)
            .execute(&mut *tx)
            .await?;

        for component in components {
            sqlx::query(
                "INSERT INTO formula_components (formula_id, supply_id, mg_per_unit) \
                 VALUES (?1, ?2, ?3)",
            )
            .bind(formula_id)
            .bind(&component.supply_id)
            .bind(component.mg_per_unit)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE formulas SET updated_at = ?2 WHERE id = ?1")
            .bind(formula_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Deletes a formula and its components.
    ///
    /// Fails with a foreign key violation while any product still
    /// references it.
    pub async fn delete(&self, id: &str) -> LedgerResult<()> {
        debug!(id = %id, "Deleting formula");

        let result = sqlx::query("DELETE FROM formulas WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Formula", id));
        }

        Ok(())
    }

    /// Counts formulas.
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM formulas")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
