//! # Employee Repository
//!
//! Database operations for staff members.
//!
//! Employees are referenced by invoices (with a name snapshot), so they
//! are never deleted - only deactivated.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use aroma_core::validation::validate_name;
use aroma_core::{CoreError, Employee};

use crate::error::{LedgerError, LedgerResult};

const SELECT_EMPLOYEE: &str =
    "SELECT id, full_name, is_active, created_at, updated_at FROM employees";

/// Repository for employee database operations.
#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Creates a new EmployeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    /// Inserts a new employee.
    pub async fn insert(&self, employee: &Employee) -> LedgerResult<()> {
        validate_name(&employee.full_name).map_err(CoreError::from)?;

        debug!(id = %employee.id, name = %employee.full_name, "Inserting employee");

        sqlx::query(
            "INSERT INTO employees (id, full_name, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&employee.id)
        .bind(&employee.full_name)
        .bind(employee.is_active)
        .bind(employee.created_at)
        .bind(employee.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an employee by ID.
    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(&format!("{SELECT_EMPLOYEE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(employee)
    }

    /// Lists active employees, sorted by name.
    pub async fn list_active(&self) -> LedgerResult<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(&format!(
            "{SELECT_EMPLOYEE} WHERE is_active = 1 ORDER BY full_name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    /// Updates an employee's name and active flag.
    pub async fn update(&self, employee: &Employee) -> LedgerResult<()> {
        validate_name(&employee.full_name).map_err(CoreError::from)?;

        debug!(id = %employee.id, "Updating employee");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE employees SET full_name = ?2, is_active = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&employee.id)
        .bind(&employee.full_name)
        .bind(employee.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Employee", &employee.id));
        }

        Ok(())
    }

    /// Deactivates an employee.
    ///
    /// Invoices posted by them keep their name snapshot.
    pub async fn deactivate(&self, id: &str) -> LedgerResult<()> {
        debug!(id = %id, "Deactivating employee");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE employees SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("Employee", id));
        }

        Ok(())
    }

    /// Counts active employees.
    pub async fn count(&self) -> LedgerResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
