//! # Return Availability
//!
//! How much of each sale line can still be returned.
//!
//! ## Aggregation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EVERYTHING AGGREGATES IN INDIVIDUAL UNITS                              │
//! │                                                                         │
//! │  Sale line: 2 strips of 10        →  sold     = 20 individual           │
//! │  Prior return: 1 strip            →  returned = 10 individual           │
//! │  Prior return: 4 loose tablets    →  returned =  4 individual           │
//! │                                      ─────────────────────────          │
//! │  Remaining                           20 - 14  =  6 individual           │
//! │                                                                         │
//! │  Offered to the caller:                                                 │
//! │    individual frame: 6                                                  │
//! │    container frame:  6 / 10 = 0   (floor: no partial strips)            │
//! │                                                                         │
//! │  Rejected and cancelled returns are excluded from `returned` before     │
//! │  this module ever sees them (the repository filters by status).         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ReturnError, ReturnResult};
use crate::types::{Medicine, ReturnedQuantity, SaleAggregate, SaleLine};
use crate::units::{available_quantity_in, individual_units, UnitType};

// =============================================================================
// Available Line View
// =============================================================================

/// Per-sale-line availability, in both frames the medicine sells in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AvailableLine {
    pub sale_line_id: String,
    pub medicine_id: String,
    pub medicine_name: String,
    pub batch_number: Option<String>,
    /// Quantity originally sold, in `original_unit_type` units.
    pub original_quantity: i64,
    pub original_unit_type: UnitType,
    /// Sale-time price per original unit.
    pub unit_price_cents: i64,
    pub units_per_container: i64,
    /// Individual units already consumed by accepted returns.
    pub returned_individual: i64,
    /// Individual units still returnable.
    pub remaining_individual: i64,
    /// Whole containers still returnable (floored). Zero when the medicine
    /// does not sell containers.
    pub available_containers: i64,
    /// Individual units still returnable. Zero when the medicine does not
    /// sell loose units.
    pub available_individual: i64,
}

impl AvailableLine {
    /// Availability in the requested frame, honoring sellable flags.
    pub fn available_in(&self, unit: UnitType) -> i64 {
        match unit {
            UnitType::Container => self.available_containers,
            UnitType::Individual => self.available_individual,
        }
    }

    /// Whether anything at all remains on this line.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_individual <= 0
    }
}

// =============================================================================
// Availability Math
// =============================================================================

/// Individual units already returned against one sale line.
///
/// `returned` may span the whole sale; entries for other lines are skipped.
pub fn returned_individual_units(
    line: &SaleLine,
    returned: &[ReturnedQuantity],
    units_per_container: i64,
) -> i64 {
    returned
        .iter()
        .filter(|q| q.sale_line_id == line.id)
        .map(|q| individual_units(q.quantity, q.unit_type, units_per_container))
        .sum()
}

/// Individual units still returnable on one sale line. Never negative, even
/// if historic data over-counts (legacy imports, hand-edited rows).
pub fn remaining_individual_units(
    line: &SaleLine,
    returned: &[ReturnedQuantity],
    units_per_container: i64,
) -> i64 {
    let sold = individual_units(line.quantity, line.unit_type, units_per_container);
    let consumed = returned_individual_units(line, returned, units_per_container);
    (sold - consumed).max(0)
}

/// Builds the availability view for one sale line.
pub fn availability_for_line(
    line: &SaleLine,
    medicine: &Medicine,
    returned: &[ReturnedQuantity],
) -> AvailableLine {
    let k = medicine.units_per_container;
    let returned_individual = returned_individual_units(line, returned, k);
    let sold = individual_units(line.quantity, line.unit_type, k);
    let remaining = (sold - returned_individual).max(0);

    AvailableLine {
        sale_line_id: line.id.clone(),
        medicine_id: medicine.id.clone(),
        medicine_name: line.medicine_name.clone(),
        batch_number: line.batch_number.clone(),
        original_quantity: line.quantity,
        original_unit_type: line.unit_type,
        unit_price_cents: line.unit_price_cents,
        units_per_container: k,
        returned_individual,
        remaining_individual: remaining,
        available_containers: if medicine.sell_by_container {
            available_quantity_in(UnitType::Container, remaining, k)
        } else {
            0
        },
        available_individual: if medicine.sell_by_individual {
            available_quantity_in(UnitType::Individual, remaining, k)
        } else {
            0
        },
    }
}

/// Builds the availability view for every line of a sale.
///
/// Fails with `MedicineNotFound` if a line references a medicine the
/// aggregate did not load, since availability cannot be computed without
/// `units_per_container`.
pub fn available_for_return(
    aggregate: &SaleAggregate,
    returned: &[ReturnedQuantity],
) -> ReturnResult<Vec<AvailableLine>> {
    aggregate
        .lines
        .iter()
        .map(|line| {
            let medicine = aggregate
                .medicine(&line.medicine_id)
                .ok_or_else(|| ReturnError::MedicineNotFound(line.medicine_id.clone()))?;
            Ok(availability_for_line(line, medicine, returned))
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
