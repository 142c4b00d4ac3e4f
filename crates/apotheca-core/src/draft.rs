//! # Return Draft
//!
//! Pure assembly of a persistable return from a validated request.
//!
//! ## Division of Labor
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  eligibility.rs   decides WHETHER the request is acceptable             │
//! │  draft.rs         decides WHAT gets written: amounts, totals, flags     │
//! │  engine (I/O)     mints ids and timestamps, wraps it in a transaction   │
//! │                                                                         │
//! │  Drafts carry no ids and no clock values, so the same request always    │
//! │  produces the same draft. All refund math funnels through here.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReturnError, ReturnResult};
use crate::types::{CreateReturnRequest, RefundMethod, SaleAggregate};
use crate::units::{convert_amount, UnitType};

// =============================================================================
// Totals
// =============================================================================

/// The two monetary figures on a return header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnTotals {
    /// Sum of line refunds.
    pub subtotal_cents: i64,
    /// subtotal + tax adjustment - discount adjustment, floored at zero.
    pub total_return_amount_cents: i64,
}

/// The single authoritative totals computation. Everything that displays or
/// stores a return total goes through this.
pub fn compute_return_totals(
    line_amounts: impl IntoIterator<Item = i64>,
    tax_adjustment_cents: i64,
    discount_adjustment_cents: i64,
) -> ReturnTotals {
    let subtotal_cents: i64 = line_amounts.into_iter().sum();
    let total = subtotal_cents + tax_adjustment_cents - discount_adjustment_cents;
    ReturnTotals {
        subtotal_cents,
        total_return_amount_cents: total.max(0),
    }
}

// =============================================================================
// Draft Types
// =============================================================================

/// One line of a return, ready to persist once ids are minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineDraft {
    pub sale_line_id: String,
    pub medicine_id: String,
    /// Frozen from the sale line, not from the live medicine.
    pub medicine_name: String,
    pub batch_number: Option<String>,
    pub return_quantity: i64,
    pub unit_type: UnitType,
    pub original_quantity: i64,
    pub original_unit_type: UnitType,
    /// Sale-time price per original unit.
    pub unit_price_cents: i64,
    pub return_amount_cents: i64,
    pub restore_to_inventory: bool,
}

/// A return ready to persist once ids, number, and timestamps are minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnDraft {
    pub sale_id: String,
    pub store_id: String,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub tax_adjustment_cents: i64,
    pub discount_adjustment_cents: i64,
    pub total_return_amount_cents: i64,
    pub return_reason: String,
    pub refund_method: RefundMethod,
    pub restore_inventory: bool,
    pub requires_manager_approval: bool,
    pub processed_by: String,
    pub notes: Option<String>,
    pub lines: Vec<ReturnLineDraft>,
}

impl ReturnDraft {
    /// Lines that actually want stock put back.
    pub fn restorable_lines(&self) -> impl Iterator<Item = &ReturnLineDraft> {
        self.lines.iter().filter(|l| l.restore_to_inventory)
    }
}

// =============================================================================
// Draft Assembly
// =============================================================================

/// Builds the persistable draft for a request that already passed
/// eligibility.
///
/// Refund amounts are converted from the sale line's price frame into the
/// requested frame here and nowhere else. The store comes from the sale, so
/// a return can never land in a different store than its sale.
pub fn build_return_draft(
    aggregate: &SaleAggregate,
    request: &CreateReturnRequest,
    requires_manager_approval: bool,
) -> ReturnResult<ReturnDraft> {
    let sale = &aggregate.sale;
    let mut lines = Vec::with_capacity(request.items.len());

    for item in &request.items {
        let line = aggregate
            .line(&item.sale_line_id)
            .ok_or_else(|| ReturnError::SaleLineNotFound {
                sale_line_id: item.sale_line_id.clone(),
                invoice: sale.invoice_number.clone(),
            })?;
        let medicine = aggregate
            .medicine(&line.medicine_id)
            .ok_or_else(|| ReturnError::MedicineNotFound(line.medicine_id.clone()))?;

        let amount = convert_amount(
            line.unit_price(),
            line.unit_type,
            item.quantity,
            item.unit_type,
            medicine.units_per_container,
        );

        lines.push(ReturnLineDraft {
            sale_line_id: line.id.clone(),
            medicine_id: line.medicine_id.clone(),
            medicine_name: line.medicine_name.clone(),
            batch_number: line.batch_number.clone(),
            return_quantity: item.quantity,
            unit_type: item.unit_type,
            original_quantity: line.quantity,
            original_unit_type: line.unit_type,
            unit_price_cents: line.unit_price_cents,
            return_amount_cents: amount.cents(),
            // The header-level switch overrides every line.
            restore_to_inventory: request.restore_inventory && item.restore_to_inventory,
        });
    }

    let totals = compute_return_totals(
        lines.iter().map(|l| l.return_amount_cents),
        request.tax_adjustment_cents,
        request.discount_adjustment_cents,
    );

    Ok(ReturnDraft {
        sale_id: sale.id.clone(),
        store_id: sale.store_id.clone(),
        customer_id: request
            .customer_id
            .clone()
            .or_else(|| sale.customer_id.clone()),
        subtotal_cents: totals.subtotal_cents,
        tax_adjustment_cents: request.tax_adjustment_cents,
        discount_adjustment_cents: request.discount_adjustment_cents,
        total_return_amount_cents: totals.total_return_amount_cents,
        return_reason: request.return_reason.trim().to_string(),
        refund_method: request.refund_method,
        restore_inventory: request.restore_inventory,
        requires_manager_approval,
        processed_by: request.processed_by.clone(),
        notes: request.notes.clone(),
        lines,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Medicine, ReturnLineRequest, Sale, SaleLine, SaleStatus};
    use chrono::Utc;

    fn aggregate() -> SaleAggregate {
        let now = Utc::now();
        SaleAggregate {
            sale: Sale {
                id: "sale1".into(),
                store_id: "s1".into(),
                customer_id: Some("cust-9".into()),
                invoice_number: "INV-1001".into(),
                status: SaleStatus::Completed,
                is_returned: false,
                subtotal_cents: 2000,
                total_cents: 2000,
                sale_date: now,
                created_at: now,
                updated_at: now,
            },
            lines: vec![SaleLine {
                id: "l1".into(),
                sale_id: "sale1".into(),
                medicine_id: "m1".into(),
                medicine_name: "Amoxicillin 500mg".into(),
                batch_number: Some("B-100".into()),
                quantity: 1,
                unit_type: UnitType::Container,
                unit_price_cents: 2000,
                line_total_cents: 2000,
                created_at: now,
            }],
            medicines: vec![Medicine {
                id: "m1".into(),
                store_id: "s1".into(),
                name: "Amoxicillin 500mg".into(),
                generic_name: None,
                batch_number: Some("B-100".into()),
                expiry_date: None,
                sell_by_container: true,
                sell_by_individual: true,
                units_per_container: 10,
                container_price_cents: 2000,
                individual_price_cents: Some(200),
                container_stock: 10,
                individual_stock: 10,
                is_active: true,
                created_at: now,
                updated_at: now,
            }],
        }
    }

    fn request(items: Vec<ReturnLineRequest>) -> CreateReturnRequest {
        CreateReturnRequest {
            sale_id: "sale1".into(),
            items,
            return_reason: "  damaged packaging  ".into(),
            refund_method: RefundMethod::Cash,
            restore_inventory: true,
            tax_adjustment_cents: 0,
            discount_adjustment_cents: 0,
            processed_by: "user-1".into(),
            customer_id: None,
            notes: None,
        }
    }

    fn line_item(quantity: i64, unit: UnitType) -> ReturnLineRequest {
        ReturnLineRequest {
            sale_line_id: "l1".into(),
            quantity,
            unit_type: unit,
            restore_to_inventory: true,
        }
    }

    #[test]
    fn test_cross_unit_refund_amount() {
        // Strip of 10 sold at $20.00; 5 loose tablets back = $10.00.
        let req = request(vec![line_item(5, UnitType::Individual)]);
        let draft = build_return_draft(&aggregate(), &req, false).unwrap();

        assert_eq!(draft.lines.len(), 1);
        let line = &draft.lines[0];
        assert_eq!(line.return_amount_cents, 1000);
        assert_eq!(line.original_quantity, 1);
        assert_eq!(line.original_unit_type, UnitType::Container);
        assert_eq!(line.unit_price_cents, 2000);
        assert_eq!(draft.subtotal_cents, 1000);
        assert_eq!(draft.total_return_amount_cents, 1000);
    }

    #[test]
    fn test_reason_is_trimmed_and_customer_falls_back_to_sale() {
        let req = request(vec![line_item(1, UnitType::Container)]);
        let draft = build_return_draft(&aggregate(), &req, false).unwrap();
        assert_eq!(draft.return_reason, "damaged packaging");
        assert_eq!(draft.customer_id.as_deref(), Some("cust-9"));
        assert_eq!(draft.store_id, "s1");

        let mut req = request(vec![line_item(1, UnitType::Container)]);
        req.customer_id = Some("walk-in".into());
        let draft = build_return_draft(&aggregate(), &req, false).unwrap();
        assert_eq!(draft.customer_id.as_deref(), Some("walk-in"));
    }

    #[test]
    fn test_header_restore_switch_overrides_lines() {
        let mut req = request(vec![line_item(1, UnitType::Container)]);
        req.restore_inventory = false;
        let draft = build_return_draft(&aggregate(), &req, false).unwrap();
        assert!(!draft.lines[0].restore_to_inventory);
        assert_eq!(draft.restorable_lines().count(), 0);
    }

    #[test]
    fn test_per_line_restore_opt_out() {
        let mut keep = line_item(2, UnitType::Individual);
        keep.restore_to_inventory = false;
        let req = request(vec![line_item(3, UnitType::Individual), keep]);
        let draft = build_return_draft(&aggregate(), &req, false).unwrap();
        assert!(draft.lines[0].restore_to_inventory);
        assert!(!draft.lines[1].restore_to_inventory);
        assert_eq!(draft.restorable_lines().count(), 1);
    }

    #[test]
    fn test_totals_with_adjustments() {
        let totals = compute_return_totals([1000, 500], 120, 200);
        assert_eq!(totals.subtotal_cents, 1500);
        assert_eq!(totals.total_return_amount_cents, 1420);
    }

    #[test]
    fn test_totals_floor_at_zero() {
        let totals = compute_return_totals([300], 0, 600);
        assert_eq!(totals.subtotal_cents, 300);
        assert_eq!(totals.total_return_amount_cents, 0);
    }

    #[test]
    fn test_unknown_line_fails() {
        let mut bad = line_item(1, UnitType::Container);
        bad.sale_line_id = "nope".into();
        let req = request(vec![bad]);
        let err = build_return_draft(&aggregate(), &req, false).unwrap_err();
        assert!(matches!(err, ReturnError::SaleLineNotFound { .. }));
    }

    #[test]
    fn test_manager_flag_is_carried() {
        let req = request(vec![line_item(1, UnitType::Container)]);
        let draft = build_return_draft(&aggregate(), &req, true).unwrap();
        assert!(draft.requires_manager_approval);
    }
}
