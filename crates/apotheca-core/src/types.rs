//! # Domain Types
//!
//! Core domain types for the Apotheca return engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Medicine     │   │      Sale       │   │     Return      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  dual stock:    │   │  invoice_number │   │  return_number  │       │
//! │  │   container     │   │  is_returned    │   │  status         │       │
//! │  │   individual    │   │  SaleLine[]     │   │  ReturnLine[]   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   UnitType      │   │  ReturnStatus   │   │  RefundMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Container      │   │  Pending → ...  │   │  Cash           │       │
//! │  │  Individual     │   │  → Completed    │   │  StoreCredit    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (invoice_number, return_number, etc.) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::units::UnitType;

// =============================================================================
// Store
// =============================================================================

/// A pharmacy location.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: String,
    pub name: String,
    /// Short mnemonic, used as the return-number prefix (e.g. "PHX").
    pub code: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Medicine
// =============================================================================

/// A medicine with dual-unit inventory.
///
/// Container stock and individual stock are INDEPENDENT counters. Restoring
/// two strips touches `container_stock` only; restoring five loose tablets
/// touches `individual_stock` only. Nothing here converts between the two.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Store this medicine belongs to.
    pub store_id: String,

    /// Display name shown to pharmacist and on return paperwork.
    pub name: String,

    /// Generic / chemical name.
    pub generic_name: Option<String>,

    /// Manufacturer batch number.
    pub batch_number: Option<String>,

    /// Last day the medicine is usable. None means no expiry tracked.
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    /// Whether whole containers can be sold (and therefore returned).
    pub sell_by_container: bool,

    /// Whether loose individual units can be sold (and therefore returned).
    pub sell_by_individual: bool,

    /// How many individual units one container holds. Always >= 1.
    pub units_per_container: i64,

    /// Price of one whole container in cents.
    pub container_price_cents: i64,

    /// Price of one individual unit in cents, if sold loose.
    pub individual_price_cents: Option<i64>,

    /// Whole containers on the shelf.
    pub container_stock: i64,

    /// Loose units in the dispensing drawer.
    pub individual_stock: i64,

    /// Whether medicine is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Whether this medicine is sellable (and returnable) in `unit`.
    pub fn sells_unit(&self, unit: UnitType) -> bool {
        match unit {
            UnitType::Container => self.sell_by_container,
            UnitType::Individual => self.sell_by_individual,
        }
    }

    /// Current list price for one unit of `unit`, if one is configured.
    pub fn price_for(&self, unit: UnitType) -> Option<Money> {
        match unit {
            UnitType::Container => Some(Money::from_cents(self.container_price_cents)),
            UnitType::Individual => self.individual_price_cents.map(Money::from_cents),
        }
    }

    /// Current stock counter for `unit`.
    pub fn stock_for(&self, unit: UnitType) -> i64 {
        match unit {
            UnitType::Container => self.container_stock,
            UnitType::Individual => self.individual_stock,
        }
    }

    /// Whether the medicine was expired before `today`. A medicine expiring
    /// today is still usable through the day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry < today,
            None => false,
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and finalized.
    Completed,
    /// Sale is awaiting payment or pickup.
    Pending,
    /// Sale was cancelled before completion.
    Cancelled,
    /// Sale has been consumed by returns (terminal for return purposes).
    Returned,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A finalized sale, as seen by the return engine.
///
/// Read-mostly collaborator data: the only mutation this engine performs is
/// the one-way flip to `Returned` once every line is fully consumed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub store_id: String,
    pub customer_id: Option<String>,
    pub invoice_number: String,
    pub status: SaleStatus,
    pub is_returned: bool,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Whether any part of this sale can still be returned.
    pub fn is_returnable(&self) -> bool {
        !self.is_returned && self.status != SaleStatus::Returned
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze medicine data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub medicine_id: String,
    /// Medicine name at time of sale (frozen).
    pub medicine_name: String,
    /// Batch number at time of sale (frozen).
    pub batch_number: Option<String>,
    /// Quantity sold, in `unit_type` units.
    pub quantity: i64,
    /// The frame the sale was made in: containers or individual units.
    pub unit_type: UnitType,
    /// Price per `unit_type` unit in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Return Status
// =============================================================================

/// Lifecycle state of a return.
///
/// ```text
///            ┌──────────► rejected   (terminal, triggers stock reversal)
///            │
/// pending ───┼──────────► cancelled  (terminal, stock stays restored)
///            │
///            └─► approved ─┬─► processed ─► completed  (terminal)
///                          └───────────────► completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    /// Recorded, waiting for review.
    Pending,
    /// Reviewed and accepted; refund not yet settled.
    Approved,
    /// Refund handed over, settlement in flight.
    Processed,
    /// Fully settled.
    Completed,
    /// Refused; restored stock gets reversed.
    Rejected,
    /// Withdrawn before approval; restored stock stays.
    Cancelled,
}

impl ReturnStatus {
    /// Lowercase name, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Processed => "processed",
            ReturnStatus::Completed => "completed",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReturnStatus::Completed | ReturnStatus::Rejected | ReturnStatus::Cancelled
        )
    }

    /// Whether returns in this state count against sold quantities. Rejected
    /// and cancelled returns release what they had claimed.
    pub const fn consumes_quantity(&self) -> bool {
        !matches!(self, ReturnStatus::Rejected | ReturnStatus::Cancelled)
    }
}

impl Default for ReturnStatus {
    fn default() -> Self {
        ReturnStatus::Pending
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Refund
// =============================================================================

/// Settlement state of the refund attached to a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processed,
    Completed,
    Failed,
}

impl Default for RefundStatus {
    fn default() -> Self {
        RefundStatus::Pending
    }
}

/// How the refund is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Cash from the till.
    Cash,
    /// Reversal onto the original card.
    Card,
    /// Credit on the customer account.
    StoreCredit,
    /// Manual bank transfer.
    BankTransfer,
}

impl Default for RefundMethod {
    fn default() -> Self {
        RefundMethod::Cash
    }
}

// =============================================================================
// Restoration Status
// =============================================================================

/// Header-level summary of how inventory restoration went for a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RestorationStatus {
    /// Not attempted yet.
    Pending,
    /// Some lines restored, some failed.
    Partial,
    /// Every restorable line restored (vacuously true when none are).
    Completed,
    /// Every restorable line failed.
    Failed,
    /// Restoration was declined at creation time.
    Skipped,
    /// Previously restored stock was backed out after rejection.
    Reversed,
}

impl Default for RestorationStatus {
    fn default() -> Self {
        RestorationStatus::Pending
    }
}

// =============================================================================
// Return
// =============================================================================

/// A return header.
///
/// Returns are never deleted. After insert, only status, refund, and
/// restoration metadata mutate; the monetary figures and lines are frozen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Return {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub store_id: String,

    /// The sale being returned against.
    pub sale_id: String,

    /// Business identifier: RET-<store>-<YYMM>-<seq>.
    pub return_number: String,

    pub customer_id: Option<String>,

    pub status: ReturnStatus,

    /// Sum of line return amounts in cents.
    pub subtotal_cents: i64,

    /// Tax given back with the refund (subtracted from nothing, added to
    /// the total). Caller-supplied, recorded as-is.
    pub tax_adjustment_cents: i64,

    /// Discount originally granted that the refund claws back.
    pub discount_adjustment_cents: i64,

    /// subtotal + tax_adjustment - discount_adjustment, floored at zero.
    pub total_return_amount_cents: i64,

    /// Why the customer brought it back.
    pub return_reason: String,

    pub refund_method: RefundMethod,

    pub refund_status: RefundStatus,

    /// External reference (card reversal id, transfer number).
    pub refund_reference: Option<String>,

    /// Stamped when refund_status first becomes Completed.
    #[ts(as = "Option<String>")]
    pub refund_processed_at: Option<DateTime<Utc>>,

    /// Whether this return wants stock put back at all.
    pub restore_inventory: bool,

    pub inventory_restoration_status: RestorationStatus,

    /// Set when the return was filed after the manager-approval threshold.
    pub requires_manager_approval: bool,

    /// Who filed the return.
    pub processed_by: String,

    pub approved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,

    pub completed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,

    pub rejected_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Return {
    /// Returns the refund total as Money.
    #[inline]
    pub fn total_return_amount(&self) -> Money {
        Money::from_cents(self.total_return_amount_cents)
    }
}

// =============================================================================
// Return Line
// =============================================================================

/// A line item in a return.
///
/// Carries both the requested frame (`return_quantity` in `unit_type`) and
/// the sale's original frame, plus flat restoration/reversal audit columns.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub id: String,
    pub return_id: String,
    pub sale_line_id: String,
    pub medicine_id: String,
    /// Medicine name at time of return (frozen from the sale line).
    pub medicine_name: String,
    pub batch_number: Option<String>,
    /// Quantity being returned, in `unit_type` units.
    pub return_quantity: i64,
    /// Frame the return was requested in.
    pub unit_type: UnitType,
    /// Quantity originally sold, in `original_unit_type` units.
    pub original_quantity: i64,
    pub original_unit_type: UnitType,
    /// Sale-time price per `original_unit_type` unit (frozen).
    pub unit_price_cents: i64,
    /// Refund for this line, after cross-unit conversion.
    pub return_amount_cents: i64,
    /// Whether this line wants its stock put back.
    pub restore_to_inventory: bool,
    /// Set once stock was successfully put back. Idempotency guard.
    pub inventory_restored: bool,
    /// Set once restored stock was backed out. Idempotency guard.
    pub inventory_reversed: bool,
    #[ts(as = "Option<String>")]
    pub restored_at: Option<DateTime<Utc>>,
    pub restored_by: Option<String>,
    /// Containers actually added back to stock.
    pub restored_containers: i64,
    /// Individual units actually added back to stock.
    pub restored_individual: i64,
    #[ts(as = "Option<String>")]
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_by: Option<String>,
    /// Quantity actually deducted on reversal (clamped to stock on hand).
    pub reversed_quantity: Option<i64>,
    pub reversal_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ReturnLine {
    /// Returns the line refund as Money.
    #[inline]
    pub fn return_amount(&self) -> Money {
        Money::from_cents(self.return_amount_cents)
    }
}

// =============================================================================
// Request DTOs
// =============================================================================

fn default_true() -> bool {
    true
}

/// Request to create a return against a sale.
///
/// The store is derived from the sale, never passed in, so a return can
/// never land in a different store than its sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateReturnRequest {
    pub sale_id: String,
    pub items: Vec<ReturnLineRequest>,
    pub return_reason: String,
    #[serde(default)]
    pub refund_method: RefundMethod,
    /// Whether to put stock back at creation. Defaults to true.
    #[serde(default = "default_true")]
    pub restore_inventory: bool,
    #[serde(default)]
    pub tax_adjustment_cents: i64,
    #[serde(default)]
    pub discount_adjustment_cents: i64,
    /// Who is filing the return.
    pub processed_by: String,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
}

/// One line of a return request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLineRequest {
    pub sale_line_id: String,
    /// Quantity to return, in `unit_type` units.
    pub quantity: i64,
    pub unit_type: UnitType,
    /// Per-line opt-out from restoration. Defaults to true; ignored when the
    /// header-level restore_inventory is false.
    #[serde(default = "default_true")]
    pub restore_to_inventory: bool,
}

/// Request to move a return through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateReturnStatusRequest {
    pub status: ReturnStatus,
    /// Who is making the change.
    pub actor: String,
    /// Required when `status` is Rejected.
    pub rejection_reason: Option<String>,
    /// Optional refund-status update carried along with completion.
    pub refund_status: Option<RefundStatus>,
}

/// Request to update refund settlement details independently of status.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateRefundRequest {
    pub refund_status: Option<RefundStatus>,
    pub refund_method: Option<RefundMethod>,
    pub refund_reference: Option<String>,
    pub actor: String,
}

/// Filters for listing returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnFilters {
    pub status: Option<ReturnStatus>,
    pub sale_id: Option<String>,
    pub store_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReturnFilters {
    /// Page size, defaulted and clamped so a missing or hostile value can
    /// never turn into an unbounded scan.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    /// Page offset, floored at zero.
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// A sale with its lines and the medicines those lines reference, loaded
/// together so eligibility checks never need further I/O.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleAggregate {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub medicines: Vec<Medicine>,
}

impl SaleAggregate {
    /// Looks up a sale line by id.
    pub fn line(&self, sale_line_id: &str) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.id == sale_line_id)
    }

    /// Looks up a medicine by id.
    pub fn medicine(&self, medicine_id: &str) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == medicine_id)
    }
}

/// A return header with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnAggregate {
    pub header: Return,
    pub lines: Vec<ReturnLine>,
}

/// A previously-returned quantity against one sale line, in the frame the
/// earlier return was requested in. Raw input to availability math.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnedQuantity {
    pub sale_line_id: String,
    pub quantity: i64,
    pub unit_type: UnitType,
}

// =============================================================================
// Unit Tests
// =============================================================================
