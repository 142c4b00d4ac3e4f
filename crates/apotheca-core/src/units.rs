//! # Dual-Unit Quantities
//!
//! Pharmacies sell the same medicine in two frames of reference: whole
//! containers (a strip, bottle, or box) and loose individual units (a
//! tablet, capsule, or vial). `units_per_container` links the two.
//!
//! ## The Rounding Asymmetry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CONVERSION IS DELIBERATELY CONSERVATIVE                                │
//! │                                                                         │
//! │  Question                         Direction      Rounding               │
//! │  ───────────────────────────────  ─────────────  ─────────────────────  │
//! │  "How many containers can still   individual →   FLOOR                  │
//! │   be returned?"                   container      (9 tablets, strip of   │
//! │                                                   10 → 0 strips)        │
//! │                                                                         │
//! │  "How much of the sold container  individual →   CEIL                   │
//! │   did this return consume?"       container      (5 tablets of a strip  │
//! │                                                   of 10 → 1 strip)      │
//! │                                                                         │
//! │  Floor on availability means we never offer more than physically        │
//! │  exists. Ceil on consumption means a partially-returned container       │
//! │  counts as consumed, so the sale is marked returned early rather        │
//! │  than late.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Unit Type
// =============================================================================

/// The frame of reference for a quantity or price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    /// A whole container: strip, bottle, box.
    Container,
    /// A loose unit: tablet, capsule, vial.
    Individual,
}

impl UnitType {
    /// Lowercase name, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            UnitType::Container => "container",
            UnitType::Individual => "individual",
        }
    }
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::Container
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Quantity Conversion
// =============================================================================

/// Expresses a quantity in individual units.
///
/// Container quantities multiply by `units_per_container`; individual
/// quantities pass through unchanged. This is the exact (lossless)
/// direction of conversion, so all availability bookkeeping happens in
/// individual units.
#[inline]
pub fn individual_units(quantity: i64, unit: UnitType, units_per_container: i64) -> i64 {
    match unit {
        UnitType::Container => quantity * units_per_container,
        UnitType::Individual => quantity,
    }
}

/// How much can still be offered in `unit`, given a remaining balance in
/// individual units. Rounds DOWN so partial containers are never offered
/// as whole ones.
///
/// ## Example
/// ```rust
/// use apotheca_core::units::{available_quantity_in, UnitType};
///
/// // 19 tablets remain, strips hold 10: only 1 whole strip is returnable.
/// assert_eq!(available_quantity_in(UnitType::Container, 19, 10), 1);
/// assert_eq!(available_quantity_in(UnitType::Individual, 19, 10), 19);
/// ```
#[inline]
pub fn available_quantity_in(unit: UnitType, remaining_individual: i64, units_per_container: i64) -> i64 {
    match unit {
        UnitType::Container => remaining_individual / units_per_container,
        UnitType::Individual => remaining_individual,
    }
}

/// How much of a quantity sold in `sold_unit` a return of `quantity` in
/// `returned_unit` consumes. Rounds UP when loose units eat into a
/// container, so a partially-returned container counts as fully consumed.
///
/// ## Example
/// ```rust
/// use apotheca_core::units::{consumed_quantity_in, UnitType};
///
/// // 5 loose tablets consume 1 whole strip of 10 for completion purposes.
/// assert_eq!(
///     consumed_quantity_in(UnitType::Container, 5, UnitType::Individual, 10),
///     1
/// );
/// ```
#[inline]
pub fn consumed_quantity_in(
    sold_unit: UnitType,
    quantity: i64,
    returned_unit: UnitType,
    units_per_container: i64,
) -> i64 {
    match (returned_unit, sold_unit) {
        (UnitType::Individual, UnitType::Container) => {
            (quantity + units_per_container - 1) / units_per_container
        }
        (UnitType::Container, UnitType::Individual) => quantity * units_per_container,
        _ => quantity,
    }
}

// =============================================================================
// Amount Conversion
// =============================================================================

/// Computes the refund amount for `quantity` units of `requested_unit`,
/// given a unit price expressed per `price_unit`.
///
/// ## Conversion Table
/// ```text
/// price frame   requested frame   formula
/// ───────────   ───────────────   ─────────────────────────────────────
/// container     container         price × qty
/// individual    individual        price × qty
/// container     individual        price × qty / units_per_container
///                                 (half-up, see Money::mul_div_round)
/// individual    container         price × qty × units_per_container
/// ```
///
/// ## Example
/// ```rust
/// use apotheca_core::money::Money;
/// use apotheca_core::units::{convert_amount, UnitType};
///
/// // Strip of 10 sold at $20.00; customer returns 5 loose tablets.
/// let refund = convert_amount(
///     Money::from_cents(2000),
///     UnitType::Container,
///     5,
///     UnitType::Individual,
///     10,
/// );
/// assert_eq!(refund.cents(), 1000); // $10.00
/// ```
pub fn convert_amount(
    unit_price: Money,
    price_unit: UnitType,
    quantity: i64,
    requested_unit: UnitType,
    units_per_container: i64,
) -> Money {
    match (price_unit, requested_unit) {
        (UnitType::Container, UnitType::Individual) => {
            unit_price.mul_div_round(quantity, units_per_container)
        }
        (UnitType::Individual, UnitType::Container) => {
            unit_price.multiply_quantity(quantity * units_per_container)
        }
        _ => unit_price.multiply_quantity(quantity),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
