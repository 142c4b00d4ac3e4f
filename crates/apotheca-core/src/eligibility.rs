//! # Return Eligibility
//!
//! The ordered rule pipeline that decides whether a prospective return is
//! acceptable, given a fully-loaded sale and its return history.
//!
//! ## Check Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Sale-level gates                                                    │
//! │     ├── sale status must be completed                                   │
//! │     ├── sale not already fully returned                                 │
//! │     └── inside the return window (days since sale_date)                 │
//! │  2. Manager-approval flag (soft: sets a flag, never refuses)            │
//! │  3. Per-item gates, in request order                                    │
//! │     ├── sale line belongs to this sale                                  │
//! │     ├── medicine resolvable                                             │
//! │     ├── quantity positive and bounded                                   │
//! │     ├── requested unit is one the medicine sells                        │
//! │     └── quantity fits what is still returnable, counting earlier        │
//! │         items of THIS request against the same line                     │
//! │  4. Warnings (expired medicine) - collected, never refuse               │
//! │                                                                         │
//! │  First failure wins: the caller gets the most upstream problem.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All functions here are pure: the clock is a parameter, data is loaded by
//! the caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::availability::remaining_individual_units;
use crate::error::{ReturnError, ReturnResult, ValidationError};
use crate::policy::ReturnPolicy;
use crate::types::{ReturnLineRequest, ReturnedQuantity, SaleAggregate, SaleStatus};
use crate::units::{available_quantity_in, individual_units, UnitType};
use crate::validation::validate_return_quantity;

// =============================================================================
// Eligibility Report
// =============================================================================

/// The verdict for one requested line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckedLine {
    pub sale_line_id: String,
    pub medicine_id: String,
    pub medicine_name: String,
    /// Quantity requested, in `unit_type` units.
    pub quantity: i64,
    pub unit_type: UnitType,
    /// What was still returnable in `unit_type` when this item was checked,
    /// after earlier items of the same request.
    pub available: i64,
}

/// A passing eligibility verdict. Failing verdicts are `ReturnError`s.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EligibilityReport {
    pub invoice_number: String,
    /// Whole days between the sale and the prospective return.
    pub days_elapsed: i64,
    /// Set when the sale is older than the manager-approval threshold.
    pub requires_manager_approval: bool,
    /// Non-blocking observations (expired stock, etc.).
    pub warnings: Vec<String>,
    pub lines: Vec<CheckedLine>,
}

// =============================================================================
// Eligibility Check
// =============================================================================

/// Runs the full eligibility pipeline for a prospective return.
///
/// `returned` is the sale's accepted return history (rejected/cancelled
/// already filtered out). `now` decides window and expiry questions.
pub fn check_eligibility(
    aggregate: &SaleAggregate,
    items: &[ReturnLineRequest],
    returned: &[ReturnedQuantity],
    policy: &ReturnPolicy,
    now: DateTime<Utc>,
) -> ReturnResult<EligibilityReport> {
    let sale = &aggregate.sale;

    // ---- Sale-level gates ----

    match sale.status {
        SaleStatus::Completed => {}
        SaleStatus::Returned => {
            return Err(ReturnError::AlreadyFullyReturned {
                invoice: sale.invoice_number.clone(),
            })
        }
        SaleStatus::Pending | SaleStatus::Cancelled => {
            return Err(ValidationError::NotAllowed {
                field: "sale_status".to_string(),
                allowed: vec!["completed".to_string()],
            }
            .into())
        }
    }

    if sale.is_returned {
        return Err(ReturnError::AlreadyFullyReturned {
            invoice: sale.invoice_number.clone(),
        });
    }

    let days_elapsed = (now - sale.sale_date).num_days();
    if !policy.window_covers(days_elapsed) {
        return Err(ReturnError::ReturnWindowExpired {
            days_elapsed,
            window_days: policy.return_window_days as i64,
        });
    }

    let requires_manager_approval = policy.needs_manager_approval(days_elapsed);

    // ---- Per-item gates ----

    let today = now.date_naive();
    let mut warnings = Vec::new();
    let mut checked = Vec::with_capacity(items.len());
    // Individual units already claimed by earlier items of this request,
    // keyed by sale line.
    let mut claimed: HashMap<&str, i64> = HashMap::new();

    for item in items {
        let line = aggregate
            .line(&item.sale_line_id)
            .ok_or_else(|| ReturnError::SaleLineNotFound {
                sale_line_id: item.sale_line_id.clone(),
                invoice: sale.invoice_number.clone(),
            })?;

        let medicine = aggregate
            .medicine(&line.medicine_id)
            .ok_or_else(|| ReturnError::MedicineNotFound(line.medicine_id.clone()))?;

        validate_return_quantity(item.quantity)?;

        if !medicine.sells_unit(item.unit_type) {
            let allowed = [UnitType::Container, UnitType::Individual]
                .iter()
                .filter(|u| medicine.sells_unit(**u))
                .map(|u| u.to_string())
                .collect();
            return Err(ValidationError::NotAllowed {
                field: "unit_type".to_string(),
                allowed,
            }
            .into());
        }

        let k = medicine.units_per_container;
        let already_claimed = claimed.get(line.id.as_str()).copied().unwrap_or(0);
        let remaining = (remaining_individual_units(line, returned, k) - already_claimed).max(0);
        let available = available_quantity_in(item.unit_type, remaining, k);

        if item.quantity > available {
            return Err(ReturnError::OverReturnRequested {
                medicine: line.medicine_name.clone(),
                requested: item.quantity,
                unit: item.unit_type,
                available,
            });
        }

        *claimed.entry(line.id.as_str()).or_insert(0) +=
            individual_units(item.quantity, item.unit_type, k);

        if medicine.is_expired(today) {
            warnings.push(format!(
                "{} is past its expiry date; route returned stock to quarantine",
                line.medicine_name
            ));
        }

        checked.push(CheckedLine {
            sale_line_id: line.id.clone(),
            medicine_id: medicine.id.clone(),
            medicine_name: line.medicine_name.clone(),
            quantity: item.quantity,
            unit_type: item.unit_type,
            available,
        });
    }

    Ok(EligibilityReport {
        invoice_number: sale.invoice_number.clone(),
        days_elapsed,
        requires_manager_approval,
        warnings,
        lines: checked,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
