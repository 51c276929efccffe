//! # Formula Consumption Math
//!
//! Pure planning of raw-material consumption for a sale.
//!
//! ## How a Sale Consumes Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Line: 3 × "Nocturne EDP 50ml"                                          │
//! │                                                                         │
//! │  Product ──► formula "EDP 50ml"     ──► 0.350 g essence per unit        │
//! │          │                              ├─ alcohol   38.500 g per unit  │
//! │          │                              └─ fixative   0.150 g per unit  │
//! │          └─► essence "Jasmine Abs."  (the scent this product uses)      │
//! │                                                                         │
//! │  Plan for the line:                                                     │
//! │    Jasmine Abs.  3 × 0.350 g = 1.050 g                                  │
//! │    Alcohol 96%   3 × 38.500 g = 115.500 g                               │
//! │    Fixative      3 × 0.150 g = 0.450 g                                  │
//! │                                                                         │
//! │  Lines sharing a supply aggregate into ONE requirement per supply,      │
//! │  so the ledger debits each supply exactly once per sale.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is pure data; the ledger engine checks it against live
//! stock and turns it into debits plus a consumption snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::quantity::Grams;
use crate::types::{Formula, FormulaComponent, Product};

// =============================================================================
// Composition
// =============================================================================

/// A formula resolved with its component rows, as fetched for one
/// product at planning time.
#[derive(Debug, Clone)]
pub struct Composition {
    pub formula: Formula,
    pub components: Vec<FormulaComponent>,
}

/// Input for declaring one non-essence ingredient when creating or
/// updating a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub supply_id: String,
    pub mg_per_unit: i64,
}

// =============================================================================
// Consumption Plan
// =============================================================================

/// Aggregated per-supply requirements for one sale.
///
/// Keyed by supply id in a `BTreeMap` so iteration (and therefore the
/// order of stock debits) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ConsumptionPlan {
    requirements: BTreeMap<String, Grams>,
}

impl ConsumptionPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one product line to the plan.
    ///
    /// `composition` is `None` for resale products without a formula;
    /// those consume nothing.
    ///
    /// ## Errors
    /// `CoreError::MissingEssence` if the formula calls for essence but
    /// the product links none.
    pub fn add_line(
        &mut self,
        product: &Product,
        composition: Option<&Composition>,
        quantity: i64,
    ) -> CoreResult<()> {
        let Some(composition) = composition else {
            return Ok(());
        };

        if composition.formula.essence_mg_per_unit > 0 {
            let essence_id = product
                .essence_id
                .as_deref()
                .ok_or_else(|| CoreError::MissingEssence {
                    sku: product.sku.clone(),
                })?;
            self.require(
                essence_id,
                composition.formula.essence_per_unit().multiply_quantity(quantity),
            );
        }

        for component in &composition.components {
            self.require(
                &component.supply_id,
                component.per_unit().multiply_quantity(quantity),
            );
        }

        Ok(())
    }

    /// Adds a raw requirement to the plan.
    pub fn require(&mut self, supply_id: &str, amount: Grams) {
        if amount.is_zero() {
            return;
        }
        let entry = self
            .requirements
            .entry(supply_id.to_string())
            .or_insert_with(Grams::zero);
        *entry += amount;
    }

    /// Total requirement for one supply (zero if unplanned).
    pub fn required_for(&self, supply_id: &str) -> Grams {
        self.requirements
            .get(supply_id)
            .copied()
            .unwrap_or_else(Grams::zero)
    }

    /// Iterates requirements in supply-id order.
    pub fn requirements(&self) -> impl Iterator<Item = (&str, Grams)> {
        self.requirements.iter().map(|(id, qty)| (id.as_str(), *qty))
    }

    /// Number of distinct supplies this sale touches.
    pub fn supply_count(&self) -> usize {
        self.requirements.len()
    }

    /// Checks if the sale consumes any stock at all.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
