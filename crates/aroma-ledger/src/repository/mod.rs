//! # Repository Module
//!
//! Database repository implementations for Aroma POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Repositories abstract table access behind a clean API.                 │
//! │                                                                         │
//! │  Caller (UI, API, seed tool)                                           │
//! │       │                                                                 │
//! │       │  ledger.products().search("jasmine", 20)                        │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── search(&self, query, limit)                                       │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── insert(&self, product)                                            │
//! │  └── update(&self, product)                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Catalog repositories write directly. Ledger state (stock debits,      │
//! │  invoices, wallets, register days, movements) is written only by       │
//! │  the engine, inside its transactions; its repositories here serve      │
//! │  reads.                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`EmployeeRepository`](employee::EmployeeRepository) - Employee CRUD
//! - [`SupplyRepository`](supply::SupplyRepository) - Supply CRUD, restocking
//! - [`FormulaRepository`](formula::FormulaRepository) - Formula and component CRUD
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD and search
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice lookups
//! - [`RegisterRepository`](register::RegisterRepository) - Register day lookups
//! - [`WalletRepository`](wallet::WalletRepository) - Wallet account lookups
//! - [`MovementRepository`](movement::MovementRepository) - Movement journal lookups

pub mod employee;
pub mod formula;
pub mod invoice;
pub mod movement;
pub mod product;
pub mod register;
pub mod supply;
pub mod wallet;

use uuid::Uuid;

/// Generates a unique row ID.
///
/// Format: UUID v4 (e.g., "550e8400-e29b-41d4-a716-446655440000")
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::pool::{DbConfig, Ledger};
    use aroma_core::{
        ComponentSpec, Employee, Formula, Grams, PaymentMethod, Product, Supply, SupplyKind,
    };
    use chrono::Utc;

    async fn test_ledger() -> Ledger {
        Ledger::new(DbConfig::in_memory())
            .await
            .expect("Failed to create in-memory ledger")
    }

    fn employee(name: &str) -> Employee {
        let now = Utc::now();
        Employee {
            id: generate_id(),
            full_name: name.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn supply(sku: &str, name: &str, kind: SupplyKind, stock_mg: i64) -> Supply {
        let now = Utc::now();
        Supply {
            id: generate_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            kind,
            stock_mg,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn formula(name: &str, essence_mg_per_unit: i64) -> Formula {
        let now = Utc::now();
        Formula {
            id: generate_id(),
            name: name.to_string(),
            essence_mg_per_unit,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(
        sku: &str,
        name: &str,
        price_cents: i64,
        formula_id: Option<&str>,
        essence_id: Option<&str>,
    ) -> Product {
        let now = Utc::now();
        Product {
            id: generate_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents,
            formula_id: formula_id.map(String::from),
            essence_id: essence_id.map(String::from),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_employee_crud() {
        let ledger = test_ledger().await;
        let repo = ledger.employees();

        let mut marta = employee("Marta Kowalska");
        repo.insert(&marta).await.unwrap();

        let found = repo.get_by_id(&marta.id).await.unwrap().unwrap();
        assert_eq!(found.full_name, "Marta Kowalska");
        assert!(found.is_active);

        marta.full_name = "Marta Nowak".to_string();
        repo.update(&marta).await.unwrap();
        let found = repo.get_by_id(&marta.id).await.unwrap().unwrap();
        assert_eq!(found.full_name, "Marta Nowak");

        repo.insert(&employee("Adam Wiśniewski")).await.unwrap();
        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        // Sorted by name.
        assert_eq!(active[0].full_name, "Adam Wiśniewski");

        repo.deactivate(&marta.id).await.unwrap();
        assert_eq!(repo.list_active().await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_supply_crud_and_restock() {
        let ledger = test_ledger().await;
        let repo = ledger.supplies();

        let alcohol = supply("ALC96", "Perfumer's Alcohol", SupplyKind::Alcohol, 0);
        repo.insert(&alcohol).await.unwrap();

        let found = repo.get_by_sku("ALC96").await.unwrap().unwrap();
        assert_eq!(found.id, alcohol.id);
        assert_eq!(found.stock_mg, 0);

        repo.restock(&alcohol.id, Grams::from_grams(500))
            .await
            .unwrap();
        let found = repo.get_by_id(&alcohol.id).await.unwrap().unwrap();
        assert_eq!(found.stock_mg, 500_000);

        // Zero restock is rejected.
        let err = repo
            .restock(&alcohol.id, Grams::from_milligrams(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(_)));

        let essences = repo.list_by_kind(SupplyKind::Essence).await.unwrap();
        assert!(essences.is_empty());
        let alcohols = repo.list_by_kind(SupplyKind::Alcohol).await.unwrap();
        assert_eq!(alcohols.len(), 1);
    }

    #[tokio::test]
    async fn test_supply_adjustment_cannot_go_negative() {
        let ledger = test_ledger().await;
        let repo = ledger.supplies();

        let jasmine = supply("ESS-JAS", "Jasmine Absolute", SupplyKind::Essence, 1_000);
        repo.insert(&jasmine).await.unwrap();

        let err = repo
            .adjust_stock(&jasmine.id, Grams::from_milligrams(-1_500), "spill")
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientStock { sku, available_mg, .. } => {
                assert_eq!(sku, "ESS-JAS");
                assert_eq!(available_mg, 1_000);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        repo.adjust_stock(&jasmine.id, Grams::from_milligrams(-500), "spill")
            .await
            .unwrap();
        repo.adjust_stock(&jasmine.id, Grams::from_milligrams(250), "recount")
            .await
            .unwrap();

        let found = repo.get_by_id(&jasmine.id).await.unwrap().unwrap();
        assert_eq!(found.stock_mg, 750);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let ledger = test_ledger().await;
        let repo = ledger.supplies();

        repo.insert(&supply("ALC96", "Alcohol", SupplyKind::Alcohol, 0))
            .await
            .unwrap();
        let err = repo
            .insert(&supply("ALC96", "Alcohol Again", SupplyKind::Alcohol, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_formula_composition_roundtrip() {
        let ledger = test_ledger().await;

        let alcohol = supply("ALC96", "Alcohol", SupplyKind::Alcohol, 0);
        let fixative = supply("FIX-01", "Fixative", SupplyKind::Fixative, 0);
        ledger.supplies().insert(&alcohol).await.unwrap();
        ledger.supplies().insert(&fixative).await.unwrap();

        let night = formula("Jasmine Night", 350);
        let components = vec![ComponentSpec {
            supply_id: alcohol.id.clone(),
            mg_per_unit: 650,
        }];
        ledger.formulas().insert(&night, &components).await.unwrap();

        let composition = ledger
            .formulas()
            .get_composition(&night.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(composition.formula.essence_mg_per_unit, 350);
        assert_eq!(composition.components.len(), 1);
        assert_eq!(composition.components[0].mg_per_unit, 650);

        // Replace the component list.
        let replacement = vec![
            ComponentSpec {
                supply_id: alcohol.id.clone(),
                mg_per_unit: 600,
            },
            ComponentSpec {
                supply_id: fixative.id.clone(),
                mg_per_unit: 100,
            },
        ];
        ledger
            .formulas()
            .set_components(&night.id, &replacement)
            .await
            .unwrap();

        let composition = ledger
            .formulas()
            .get_composition(&night.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(composition.components.len(), 2);
        let fixative_dose = composition
            .components
            .iter()
            .find(|c| c.supply_id == fixative.id)
            .unwrap();
        assert_eq!(fixative_dose.mg_per_unit, 100);
    }

    #[tokio::test]
    async fn test_formula_delete_blocked_by_product() {
        let ledger = test_ledger().await;

        let night = formula("Jasmine Night", 350);
        ledger.formulas().insert(&night, &[]).await.unwrap();
        ledger
            .products()
            .insert(&product("PRF-001", "Jasmine 50ml", 5_000, Some(&night.id), None))
            .await
            .unwrap();

        let err = ledger.formulas().delete(&night.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::ForeignKeyViolation { .. }));

        // Unreferenced formulas delete cleanly.
        let spare = formula("Spare", 0);
        ledger.formulas().insert(&spare, &[]).await.unwrap();
        ledger.formulas().delete(&spare.id).await.unwrap();
        assert!(ledger.formulas().get_by_id(&spare.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_links_are_checked() {
        let ledger = test_ledger().await;

        // Missing formula.
        let err = ledger
            .products()
            .insert(&product("PRF-001", "Jasmine 50ml", 5_000, Some("no-such-id"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        // Essence link must point at an essence, not alcohol.
        let alcohol = supply("ALC96", "Alcohol", SupplyKind::Alcohol, 0);
        ledger.supplies().insert(&alcohol).await.unwrap();
        let err = ledger
            .products()
            .insert(&product("PRF-002", "Odd", 5_000, None, Some(&alcohol.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(_)));

        // A proper essence link works.
        let jasmine = supply("ESS-JAS", "Jasmine Absolute", SupplyKind::Essence, 0);
        ledger.supplies().insert(&jasmine).await.unwrap();
        ledger
            .products()
            .insert(&product("PRF-003", "Jasmine 50ml", 5_000, None, Some(&jasmine.id)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_product_search() {
        let ledger = test_ledger().await;
        let repo = ledger.products();

        repo.insert(&product("PRF-001", "Jasmine Night 50ml", 5_000, None, None))
            .await
            .unwrap();
        repo.insert(&product("PRF-002", "Amber Oud 50ml", 7_500, None, None))
            .await
            .unwrap();
        repo.insert(&product("ACC-001", "Gift Box", 1_500, None, None))
            .await
            .unwrap();

        let hits = repo.search("PRF", 20).await.unwrap();
        assert_eq!(hits.len(), 2);

        let hits = repo.search("Jasmine", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sku, "PRF-001");

        // Empty query lists everything active.
        let hits = repo.search("  ", 20).await.unwrap();
        assert_eq!(hits.len(), 3);

        let boxed = repo.get_by_sku("ACC-001").await.unwrap().unwrap();
        repo.deactivate(&boxed.id).await.unwrap();
        let hits = repo.search("", 20).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    // UI callers consume summaries as JSON; the key casing is a contract.
    #[test]
    fn test_day_summary_line_serializes_camel_case() {
        let line = movement::DaySummaryLine {
            method: PaymentMethod::Cash,
            sales_cents: 10_000,
            cancellations_cents: -5_000,
            deposits_cents: 0,
            withdrawals_cents: -1_000,
            transfers_cents: 0,
            net_cents: 4_000,
        };

        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["method"], "cash");
        assert_eq!(json["salesCents"], 10_000);
        assert_eq!(json["withdrawalsCents"], -1_000);
        assert_eq!(json["netCents"], 4_000);
    }
}
