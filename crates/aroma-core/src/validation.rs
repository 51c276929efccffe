//! # Validation Module
//!
//! Input validation utilities for Aroma POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI, import, API)                                     │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + draft/engine checks (Rust)                     │
//! │  ├── Field validation before any write                                 │
//! │  └── Business rule validation                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use aroma_core::validation::{validate_sku, validate_quantity};
//!
//! // Validate SKU before database insert
//! validate_sku("EDP-JAS-50").unwrap();
//!
//! // Validate quantity before drafting a line
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::formula::ComponentSpec;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit), used by products and supplies.
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use aroma_core::validation::validate_sku;
///
/// assert!(validate_sku("EDP-JAS-50").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    // Check for valid characters (alphanumeric, hyphen, underscore)
    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, supply, formula, employee).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a `dd_mm_yyyy` day key.
///
/// ## Example
/// ```rust
/// use aroma_core::validation::validate_day_key;
///
/// assert!(validate_day_key("24_08_2026").is_ok());
/// assert!(validate_day_key("2026-08-24").is_err());
/// ```
pub fn validate_day_key(key: &str) -> ValidationResult<()> {
    if crate::types::parse_day_key(key).is_none() {
        return Err(ValidationError::InvalidFormat {
            field: "day_key".to_string(),
            reason: "must be a dd_mm_yyyy date".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free samples)
///
/// ## Example
/// ```rust
/// use aroma_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(2990).is_ok());  // $29.90
/// assert!(validate_price_cents(0).is_ok());     // Free sample
/// assert!(validate_price_cents(-100).is_err()); // Invalid
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment or wallet-operation amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot move zero or negative amounts
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a restock amount in milligrams.
///
/// ## Rules
/// - Must be positive (> 0); corrections go through manual adjustment
pub fn validate_restock_mg(mg: i64) -> ValidationResult<()> {
    if mg <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "restock amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a per-unit consumption in milligrams.
///
/// ## Rules
/// - Must be non-negative (>= 0); zero means "not consumed"
pub fn validate_per_unit_mg(mg: i64) -> ValidationResult<()> {
    if mg < 0 {
        return Err(ValidationError::OutOfRange {
            field: "per-unit milligrams".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a formula component list.
///
/// ## Rules
/// - Each component consumes a positive amount
/// - No supply appears twice
pub fn validate_components(components: &[ComponentSpec]) -> ValidationResult<()> {
    for (i, component) in components.iter().enumerate() {
        if component.mg_per_unit <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "component per-unit milligrams".to_string(),
            });
        }
        if components[..i]
            .iter()
            .any(|other| other.supply_id == component.supply_id)
        {
            return Err(ValidationError::Duplicate {
                field: "component supply".to_string(),
                value: component.supply_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must be a valid UUID format
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
///
/// ## Example
/// ```rust
/// use aroma_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    // Try to parse as UUID
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        // Valid SKUs
        assert!(validate_sku("EDP-JAS-50").is_ok());
        assert!(validate_sku("ALC96").is_ok());
        assert!(validate_sku("supply_1").is_ok());

        // Invalid SKUs
        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Jasmine Absolute").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_day_key() {
        assert!(validate_day_key("24_08_2026").is_ok());
        assert!(validate_day_key("05_01_2026").is_ok());
        assert!(validate_day_key("2026-08-24").is_err());
        assert!(validate_day_key("32_13_2026").is_err());
        assert!(validate_day_key("").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(2990).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(100).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_payment_amount(-100).is_err());
    }

    #[test]
    fn test_validate_components() {
        let ok = vec![
            ComponentSpec {
                supply_id: "alcohol".to_string(),
                mg_per_unit: 38_500,
            },
            ComponentSpec {
                supply_id: "fixative".to_string(),
                mg_per_unit: 150,
            },
        ];
        assert!(validate_components(&ok).is_ok());

        let duplicate = vec![
            ComponentSpec {
                supply_id: "alcohol".to_string(),
                mg_per_unit: 38_500,
            },
            ComponentSpec {
                supply_id: "alcohol".to_string(),
                mg_per_unit: 150,
            },
        ];
        assert!(validate_components(&duplicate).is_err());

        let non_positive = vec![ComponentSpec {
            supply_id: "alcohol".to_string(),
            mg_per_unit: 0,
        }];
        assert!(validate_components(&non_positive).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
