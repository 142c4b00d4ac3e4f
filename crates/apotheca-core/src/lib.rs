//! # apotheca-core: Pure Business Logic for the Apotheca Return Engine
//!
//! This crate is the **heart** of the return engine. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host Application (POS back office)              │   │
//! │  │    Return desk UI ──► Approval queue ──► Refund settlement      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              apotheca-returns (Engine / Orchestration)          │   │
//! │  │    create_return, update_status, restore_inventory, ...         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apotheca-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   units   │  │eligibility│  │   draft   │   │   │
//! │  │   │ Medicine  │  │ UnitType  │  │  window   │  │  amounts  │   │   │
//! │  │   │  Return   │  │ floor/ceil│  │ quantities│  │  totals   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  apotheca-db (Database Layer)                   │   │
//! │  │             SQLite queries, migrations, repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, Sale, Return, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`units`] - Dual-unit conversion math (containers vs. individual units)
//! - [`policy`] - Configurable return acceptance rules
//! - [`availability`] - How much of a sale line can still come back
//! - [`eligibility`] - The ordered rule pipeline for prospective returns
//! - [`draft`] - Refund amounts and persistable return assembly
//! - [`reconcile`] - When a sale counts as fully returned
//! - [`error`] - Domain error types
//! - [`validation`] - Request shape validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **No Clock**: Time is always a parameter, never read ambiently
//! 4. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 5. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use apotheca_core::money::Money;
//! use apotheca_core::units::{convert_amount, UnitType};
//!
//! // Strip of 10 tablets sold at $20.00; customer returns 5 loose tablets.
//! let refund = convert_amount(
//!     Money::from_cents(2000),
//!     UnitType::Container,
//!     5,
//!     UnitType::Individual,
//!     10,
//! );
//! assert_eq!(refund.cents(), 1000); // $10.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod draft;
pub mod eligibility;
pub mod error;
pub mod money;
pub mod policy;
pub mod reconcile;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use apotheca_core::Money` instead of
// `use apotheca_core::money::Money`

pub use availability::AvailableLine;
pub use draft::{ReturnDraft, ReturnLineDraft, ReturnTotals};
pub use eligibility::EligibilityReport;
pub use error::{ReturnError, ReturnResult, ValidationError};
pub use money::Money;
pub use policy::{HourWindow, PolicyError, ReturnPolicy};
pub use types::*;
pub use units::UnitType;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default units per container when a medicine record predates dual-unit
/// tracking.
///
/// ## Why a constant?
/// Legacy imports carry no pack size. Ten matches the most common strip
/// size dispensed here; migrations backfill with this value and flag the
/// row for pharmacist review.
pub const DEFAULT_UNITS_PER_CONTAINER: i64 = 10;

/// Maximum line items allowed in a single return
///
/// ## Business Reason
/// Returns are per-invoice; an invoice never carries anywhere near this
/// many lines, so anything larger is a malformed request.
pub const MAX_RETURN_ITEMS: usize = 50;

/// Maximum quantity on a single return line
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., scanning a barcode into the
/// quantity field).
pub const MAX_RETURN_LINE_QUANTITY: i64 = 9_999;

/// Maximum length of a return reason
pub const MAX_REASON_LENGTH: usize = 500;
