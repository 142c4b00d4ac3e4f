//! # Sale Reconciliation
//!
//! Decides when a sale counts as fully returned.
//!
//! ## Consumption Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Each accepted return line is converted into the SALE line's frame      │
//! │  separately, rounding UP, and the conversions are summed:               │
//! │                                                                         │
//! │    sold: 2 strips of 10                                                 │
//! │    return A: 5 tablets  → ceil(5/10)  = 1 strip consumed                │
//! │    return B: 5 tablets  → ceil(5/10)  = 1 strip consumed                │
//! │    total consumed: 2 of 2 strips → sale is marked RETURNED              │
//! │                                                                         │
//! │  Note the asymmetry with availability math (which sums individual       │
//! │  units exactly): two half-strip returns consume both strips here even   │
//! │  though ten loose tablets physically remain. Marking errs toward        │
//! │  closing the sale early; it never reopens it.                           │
//! │                                                                         │
//! │  The flip to RETURNED is one-way. Rejecting a return later releases     │
//! │  quantity for availability math but never un-marks the sale.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ReturnError, ReturnResult};
use crate::types::{ReturnedQuantity, SaleAggregate, SaleLine};
use crate::units::consumed_quantity_in;

// =============================================================================
// Consumption
// =============================================================================

/// How much of the sold quantity the accepted returns consume, expressed in
/// the sale line's own frame. Each history entry rounds up independently.
pub fn consumed_in_sold_frame(
    line: &SaleLine,
    returned: &[ReturnedQuantity],
    units_per_container: i64,
) -> i64 {
    returned
        .iter()
        .filter(|q| q.sale_line_id == line.id)
        .map(|q| consumed_quantity_in(line.unit_type, q.quantity, q.unit_type, units_per_container))
        .sum()
}

/// Whether accepted returns fully consume one sale line.
pub fn line_fully_consumed(
    line: &SaleLine,
    returned: &[ReturnedQuantity],
    units_per_container: i64,
) -> bool {
    consumed_in_sold_frame(line, returned, units_per_container) >= line.quantity
}

/// Whether every line of the sale is fully consumed, i.e. whether the sale
/// should be marked returned.
///
/// A sale with no lines is never marked. Fails with `MedicineNotFound` when
/// a line's medicine was not loaded, since the conversion factor lives there.
pub fn sale_fully_returned(
    aggregate: &SaleAggregate,
    returned: &[ReturnedQuantity],
) -> ReturnResult<bool> {
    if aggregate.lines.is_empty() {
        return Ok(false);
    }

    for line in &aggregate.lines {
        let medicine = aggregate
            .medicine(&line.medicine_id)
            .ok_or_else(|| ReturnError::MedicineNotFound(line.medicine_id.clone()))?;
        if !line_fully_consumed(line, returned, medicine.units_per_container) {
            return Ok(false);
        }
    }

    Ok(true)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Medicine, Sale, SaleStatus};
    use crate::units::UnitType;
    use chrono::Utc;

    fn medicine(id: &str, k: i64) -> Medicine {
        Medicine {
            id: id.into(),
            store_id: "s1".into(),
            name: format!("Medicine {id}"),
            generic_name: None,
            batch_number: None,
            expiry_date: None,
            sell_by_container: true,
            sell_by_individual: true,
            units_per_container: k,
            container_price_cents: 1000,
            individual_price_cents: Some(100),
            container_stock: 0,
            individual_stock: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sale_line(id: &str, medicine_id: &str, quantity: i64, unit: UnitType) -> SaleLine {
        SaleLine {
            id: id.into(),
            sale_id: "sale1".into(),
            medicine_id: medicine_id.into(),
            medicine_name: format!("Medicine {medicine_id}"),
            batch_number: None,
            quantity,
            unit_type: unit,
            unit_price_cents: 1000,
            line_total_cents: 1000 * quantity,
            created_at: Utc::now(),
        }
    }

    fn aggregate(lines: Vec<SaleLine>, medicines: Vec<Medicine>) -> SaleAggregate {
        SaleAggregate {
            sale: Sale {
                id: "sale1".into(),
                store_id: "s1".into(),
                customer_id: None,
                invoice_number: "INV-1".into(),
                status: SaleStatus::Completed,
                is_returned: false,
                subtotal_cents: 0,
                total_cents: 0,
                sale_date: Utc::now(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            lines,
            medicines,
        }
    }

    fn returned(line: &str, quantity: i64, unit: UnitType) -> ReturnedQuantity {
        ReturnedQuantity {
            sale_line_id: line.into(),
            quantity,
            unit_type: unit,
        }
    }

    #[test]
    fn test_exact_full_return_same_frame() {
        let agg = aggregate(
            vec![sale_line("l1", "m1", 2, UnitType::Container)],
            vec![medicine("m1", 10)],
        );
        let history = vec![returned("l1", 2, UnitType::Container)];
        assert!(sale_fully_returned(&agg, &history).unwrap());
    }

    #[test]
    fn test_partial_return_does_not_mark() {
        let agg = aggregate(
            vec![sale_line("l1", "m1", 2, UnitType::Container)],
            vec![medicine("m1", 10)],
        );
        let history = vec![returned("l1", 1, UnitType::Container)];
        assert!(!sale_fully_returned(&agg, &history).unwrap());
    }

    /// Two separate 5-tablet returns against a 2-strip line each round up
    /// to one strip, so the sale closes even though ten loose tablets never
    /// came back. This over-counting is intentional: the sale closes early
    /// and later return attempts are refused at the sale-level gate.
    #[test]
    fn test_per_line_ceil_overcounts_split_returns() {
        let agg = aggregate(
            vec![sale_line("l1", "m1", 2, UnitType::Container)],
            vec![medicine("m1", 10)],
        );

        // One 10-tablet line: ceil(10/10) = 1 strip, sale stays open.
        let single = vec![returned("l1", 10, UnitType::Individual)];
        assert_eq!(consumed_in_sold_frame(&agg.lines[0], &single, 10), 1);
        assert!(!sale_fully_returned(&agg, &single).unwrap());

        // The same 10 tablets split across two lines: 1 + 1 = 2 strips.
        let split = vec![
            returned("l1", 5, UnitType::Individual),
            returned("l1", 5, UnitType::Individual),
        ];
        assert_eq!(consumed_in_sold_frame(&agg.lines[0], &split, 10), 2);
        assert!(sale_fully_returned(&agg, &split).unwrap());
    }

    #[test]
    fn test_all_lines_must_be_consumed() {
        let agg = aggregate(
            vec![
                sale_line("l1", "m1", 1, UnitType::Container),
                sale_line("l2", "m2", 20, UnitType::Individual),
            ],
            vec![medicine("m1", 10), medicine("m2", 10)],
        );

        let only_first = vec![returned("l1", 1, UnitType::Container)];
        assert!(!sale_fully_returned(&agg, &only_first).unwrap());

        let both = vec![
            returned("l1", 1, UnitType::Container),
            // 2 strips against an individual-frame line: 2 × 10 = 20.
            returned("l2", 2, UnitType::Container),
        ];
        assert!(sale_fully_returned(&agg, &both).unwrap());
    }

    #[test]
    fn test_empty_sale_is_never_marked() {
        let agg = aggregate(vec![], vec![]);
        assert!(!sale_fully_returned(&agg, &[]).unwrap());
    }

    #[test]
    fn test_missing_medicine_is_an_error() {
        let agg = aggregate(vec![sale_line("l1", "m1", 1, UnitType::Container)], vec![]);
        let err = sale_fully_returned(&agg, &[]).unwrap_err();
        assert!(matches!(err, ReturnError::MedicineNotFound(id) if id == "m1"));
    }
}
