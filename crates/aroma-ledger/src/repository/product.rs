//! # Product Repository
//!
//! Database operations for sellable products.
//!
//! A product optionally links a formula (batch recipe) and an essence
//! supply. Both links are verified on insert and update so a sale can
//! trust them without re-checking.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use aroma_core::validation::{validate_name, validate_price_cents, validate_sku};
use aroma_core::{CoreError, Product, SupplyKind, ValidationError};

use crate::error::{LedgerError, LedgerResult};

const SELECT_PRODUCT: &str = "SELECT id, sku, name, price_cents, formula_id, essence_id, \
     is_active, created_at, updated_at FROM products";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(LedgerError::UniqueViolation)` - SKU already exists
    /// * `Err(LedgerError::NotFound)` - linked formula or essence missing
    pub async fn insert(&self, product: &Product) -> LedgerResult<()> {
        validate_sku(&product.sku).map_err(CoreError::from)?;
        validate_name(&product.name).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;
        self.check_links(product.formula_id.as_deref(), product.essence_id.as_deref())
            .await?;

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            "INSERT INTO products (id, sku, name, price_cents, formula_id, essence_id, \
             is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.formula_id)
        .bind(&product.essence_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> LedgerResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Searches active products by SKU or name prefix.
    ///
    /// An empty query lists active products.
    pub async fn search(&self, query: &str, limit: u32) -> LedgerResult<Vec<Product>> {
        let query = query.trim();

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE is_active = 1 \
             AND (sku LIKE ?1 || '%' OR name LIKE ?1 || '%') \
             ORDER BY name LIMIT ?2"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products, sorted by name.
    pub async fn list_active(&self, limit: u32) -> LedgerResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product.
    pub async fn update(&self, product: &Product) -> LedgerResult<()> {
        validate_sku(&product.sku).map_err(CoreError::from)?;
        validate_name(&product.name).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;
        self.check_links(product.formula_id.as_deref(), product.essence_id.as_deref())
            .await?;

        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET sku = ?2, name = ?3, price_cents = ?4, formula_id = ?5, \
             essence_id = ?6, is_active = ?7, updated_at = ?8 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.formula_id)
        .bind(&product.essence_id)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Deactivates a product.
    ///
    /// Posted invoices keep their line snapshots.
    pub async fn deactivate(&self, id: &str) -> LedgerResult<()> {
        debug!(id = %id, "Deactivating product");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Verifies that the formula and essence links point at real rows
    /// and that the essence link points at an essence.
    async fn check_links(
        &self,
        formula_id: Option<&str>,
        essence_id: Option<&str>,
    ) -> LedgerResult<()> {
        if let Some(formula_id) = formula_id {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM formulas WHERE id = ?1")
                    .bind(formula_id)
                    .fetch_optional(&self.pool)
                    .await?;

            if exists.is_none() {
                return Err(LedgerError::not_found("Formula", formula_id));
            }
        }

        if let Some(essence_id) = essence_id {
            let kind: Option<SupplyKind> =
                sqlx::query_scalar("SELECT kind FROM supplies WHERE id = ?1")
                    .bind(essence_id)
                    .fetch_optional(&self.pool)
                    .await?;

            match kind {
                None => return Err(LedgerError::not_found("Supply", essence_id)),
                Some(SupplyKind::Essence) => {}
                Some(_) => {
                    return Err(CoreError::from(ValidationError::InvalidFormat {
                        field: "essence_id".to_string(),
                        reason: "must reference an essence supply".to_string(),
                    })
                    .into());
                }
            }
        }

        Ok(())
    }
}
