//! # Seed Data Generator
//!
//! Populates the database with a demo perfume shop catalog for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database file
//! cargo run -p aroma-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p aroma-ledger --bin seed -- --db ./data/aroma.db
//! ```
//!
//! ## Seeded Catalog
//! - Two employees
//! - Supplies across every kind: alcohol, essences, fixative,
//!   pheromone and glycerin
//! - Three formulas with per-unit doses
//! - Perfume products wired to formula + essence, plus resale
//!   accessories with no recipe
//!
//! The three wallet accounts are created on startup regardless of
//! seeding; they start at zero.

use std::env;

use chrono::Utc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use aroma_core::{ComponentSpec, Employee, Formula, Grams, Product, Supply, SupplyKind};
use aroma_ledger::repository::generate_id;
use aroma_ledger::{DbConfig, Ledger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aroma=debug,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./aroma_pos.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Aroma POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./aroma_pos.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌿 Aroma POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let ledger = Ledger::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Never seed on top of live data.
    let existing = ledger.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding catalog...");

    let start = std::time::Instant::now();

    // --- Employees ----------------------------------------------------------

    let marta = employee("Marta Kowalska");
    let adam = employee("Adam Nowak");
    ledger.employees().insert(&marta).await?;
    ledger.employees().insert(&adam).await?;
    println!("  ✓ 2 employees");

    // --- Supplies -----------------------------------------------------------

    let alcohol = supply("ALC96", "Perfumer's Alcohol 96%", SupplyKind::Alcohol, 5_000);
    let rose = supply("ESS-ROSE", "Rose Absolute", SupplyKind::Essence, 250);
    let jasmine = supply("ESS-JAS", "Jasmine Absolute", SupplyKind::Essence, 250);
    let oud = supply("ESS-OUD", "Oud Extract", SupplyKind::Essence, 100);
    let vanilla = supply("ESS-VAN", "Vanilla Bourbon", SupplyKind::Essence, 300);
    let musk = supply("FIX-MUSK", "White Musk Fixative", SupplyKind::Fixative, 500);
    let pheromone = supply("PHE-01", "Pheromone Blend", SupplyKind::Pheromone, 50);
    let glycerin = supply("MISC-GLY", "Glycerin", SupplyKind::Other, 1_000);

    let supplies = [
        &alcohol, &rose, &jasmine, &oud, &vanilla, &musk, &pheromone, &glycerin,
    ];
    for item in supplies {
        ledger.supplies().insert(item).await?;
    }
    println!("  ✓ {} supplies", supplies.len());

    // --- Formulas -----------------------------------------------------------
    //
    // Doses are milligrams per bottle. A 50 ml bottle carries roughly
    // 45 g of liquid, most of it alcohol.

    let classic = formula("Classic 50ml", 3_500);
    ledger
        .formulas()
        .insert(
            &classic,
            &[
                component(&alcohol, 40_000),
                component(&musk, 800),
                component(&glycerin, 1_200),
            ],
        )
        .await?;

    let intense = formula("Intense 30ml", 4_500);
    ledger
        .formulas()
        .insert(
            &intense,
            &[
                component(&alcohol, 22_000),
                component(&musk, 600),
                component(&pheromone, 150),
            ],
        )
        .await?;

    let legere = formula("Eau Légère 100ml", 4_000);
    ledger
        .formulas()
        .insert(
            &legere,
            &[component(&alcohol, 88_000), component(&glycerin, 2_500)],
        )
        .await?;
    println!("  ✓ 3 formulas");

    // --- Products -----------------------------------------------------------

    let products = [
        perfume("PRF-ROSE-50", "Rose Garden 50ml", 18_900, &classic, &rose),
        perfume("PRF-JAS-50", "Jasmine Night 50ml", 17_900, &classic, &jasmine),
        perfume("PRF-JAS-30", "Jasmine Intense 30ml", 19_900, &intense, &jasmine),
        perfume("PRF-OUD-30", "Oud Royal 30ml", 29_900, &intense, &oud),
        perfume("PRF-VAN-100", "Vanilla Sky 100ml", 21_900, &legere, &vanilla),
        resale("ACC-BOX-01", "Gift Box", 2_500),
        resale("ACC-ATOM-01", "Travel Atomizer", 3_500),
        resale("TEST-5ML", "Tester Vial 5ml", 900),
    ];
    for item in &products {
        ledger.products().insert(item).await?;
    }
    println!("  ✓ {} products", products.len());

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seeded in {:?}", elapsed);

    // Verify lookups work against the fresh catalog
    println!();
    println!("Verifying...");

    let results = ledger.products().search("PRF", 10).await?;
    println!("  Search 'PRF': {} results", results.len());

    let results = ledger.products().search("Jasmine", 10).await?;
    println!("  Search 'Jasmine': {} results", results.len());

    let accounts = ledger.wallets().all().await?;
    let total = ledger.wallets().total().await?;
    println!("  Wallet accounts: {}, total {}", accounts.len(), total);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

// =============================================================================
// Entity Builders
// =============================================================================

fn employee(full_name: &str) -> Employee {
    let now = Utc::now();
    Employee {
        id: generate_id(),
        full_name: full_name.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn supply(sku: &str, name: &str, kind: SupplyKind, grams: i64) -> Supply {
    let now = Utc::now();
    Supply {
        id: generate_id(),
        sku: sku.to_string(),
        name: name.to_string(),
        kind,
        stock_mg: Grams::from_grams(grams).milligrams(),
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

fn component(supply: &Supply, mg_per_unit: i64) -> ComponentSpec {
    ComponentSpec {
        supply_id: supply.id.clone(),
        mg_per_unit,
    }
}

fn perfume(sku: &str, name: &str, price_cents: i64, formula: &Formula, essence: &Supply) -> Product {
    let now = Utc::now();
    Product {
        id: generate_id(),
        sku: sku.to_string(),
        name: name.to_string(),
        price_cents,
        formula_id: Some(formula.id.clone()),
        essence_id: Some(essence.id.clone()),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn resale(sku: &str, name: &str, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: generate_id(),
        sku: sku.to_string(),
        name: name.to_string(),
        price_cents,
        formula_id: None,
        essence_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
