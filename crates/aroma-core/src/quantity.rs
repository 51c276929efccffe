//! # Quantity Module
//!
//! Provides the `Grams` type for raw-material stock levels.
//!
//! ## Why Integer Milligrams?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock is gram-denominated but formulas use fractional grams:           │
//! │                                                                         │
//! │    Nocturne EDP 50ml = 0.350 g essence + 38.500 g alcohol per unit     │
//! │                                                                         │
//! │  In floating point, 1000 × 0.350 g drifts. In integer milligrams it    │
//! │  is exactly 350_000 mg, every time.                                    │
//! │                                                                         │
//! │  Same trick as `Money`: store the smallest unit (mg), display the      │
//! │  human unit (g).                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Grams Type
// =============================================================================

/// A mass of raw material, stored as integer milligrams.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative deltas for manual adjustments
/// - **Milligram base**: Formula ratios like 0.350 g stay exact
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grams(i64);

impl Grams {
    /// Creates a quantity from milligrams (the smallest stock unit).
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::quantity::Grams;
    ///
    /// let essence = Grams::from_milligrams(350); // 0.350 g
    /// assert_eq!(essence.milligrams(), 350);
    /// ```
    #[inline]
    pub const fn from_milligrams(mg: i64) -> Self {
        Grams(mg)
    }

    /// Creates a quantity from whole grams.
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::quantity::Grams;
    ///
    /// let alcohol = Grams::from_grams(500); // 500.000 g
    /// assert_eq!(alcohol.milligrams(), 500_000);
    /// ```
    #[inline]
    pub const fn from_grams(grams: i64) -> Self {
        Grams(grams * 1000)
    }

    /// Returns the value in milligrams.
    #[inline]
    pub const fn milligrams(&self) -> i64 {
        self.0
    }

    /// Returns the whole-gram portion.
    #[inline]
    pub const fn whole_grams(&self) -> i64 {
        self.0 / 1000
    }

    /// Returns the milligram remainder (always 0-999).
    #[inline]
    pub const fn milligrams_part(&self) -> i64 {
        (self.0 % 1000).abs()
    }

    /// Returns zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Grams(0)
    }

    /// Checks if the quantity is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the quantity is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the quantity is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Grams(self.0.abs())
    }

    /// Scales a per-unit consumption by a sold quantity.
    ///
    /// ## Example
    /// ```rust
    /// use aroma_core::quantity::Grams;
    ///
    /// let per_unit = Grams::from_milligrams(350); // 0.350 g per bottle
    /// let for_line = per_unit.multiply_quantity(4);
    /// assert_eq!(for_line.milligrams(), 1400);    // 1.400 g
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Grams(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Displays the quantity in grams with milligram precision, e.g. `12.500 g`.
impl fmt::Display for Grams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:03} g",
            sign,
            self.whole_grams().abs(),
            self.milligrams_part()
        )
    }
}

/// Default quantity is zero.
impl Default for Grams {
    fn default() -> Self {
        Grams::zero()
    }
}

impl Add for Grams {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Grams(self.0 + other.0)
    }
}

impl AddAssign for Grams {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Grams {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Grams(self.0 - other.0)
    }
}

impl SubAssign for Grams {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation, for stock restoration deltas.
impl Neg for Grams {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Grams(-self.0)
    }
}

impl Mul<i64> for Grams {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Grams(self.0 * qty)
    }
}

/// Summation over iterators of Grams (consumption plan totals).
impl Sum for Grams {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Grams::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
