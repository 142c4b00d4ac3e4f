//! # Error Types
//!
//! `ReturnError` and `ValidationError`, the domain-level failures of
//! apotheca-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError     malformed input, caught before any rule runs       │
//! │        │                                                                │
//! │        ▼  #[from]                                                       │
//! │  ReturnError         a return rule said no (window, quantity, hours)    │
//! │        │                                                                │
//! │        ▼  wrapped by apotheca-returns                                   │
//! │  EngineError         adds DbError and orchestration failures            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  caller               categorize: user mistake vs. infrastructure       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (invoice, medicine name, the
//! offending quantities) that the host application can show a complete
//! message without a second lookup. None of them are strings in disguise;
//! callers match on variants, not on message text.

use thiserror::Error;

use crate::units::UnitType;

// =============================================================================
// Return Error
// =============================================================================

/// A return request that the rules refuse.
///
/// Each variant is a distinct refusal a clerk can be told about. The
/// wording in `#[error]` is the back-office developer's view; customer
/// phrasing is the host application's concern.
#[derive(Debug, Error)]
pub enum ReturnError {
    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// A requested line does not belong to the sale.
    ///
    /// Happens when the caller sends a sale_line_id from a different
    /// sale, or a stale id after the sale was re-keyed.
    #[error("Sale line {sale_line_id} not found on invoice {invoice}")]
    SaleLineNotFound {
        sale_line_id: String,
        invoice: String,
    },

    /// Medicine referenced by a sale line cannot be found.
    #[error("Medicine not found: {0}")]
    MedicineNotFound(String),

    /// Every line of the sale has already been fully consumed by returns.
    #[error("Invoice {invoice} has already been fully returned")]
    AlreadyFullyReturned { invoice: String },

    /// The sale is older than the return window allows.
    ///
    /// Carries both ages so the message can say "sale is 45 days old,
    /// limit is 30" rather than a bare refusal.
    #[error("Return window expired: sale is {days_elapsed} days old, limit is {window_days}")]
    ReturnWindowExpired { days_elapsed: i64, window_days: i64 },

    /// More was requested than remains returnable on a sale line, counting
    /// earlier accepted returns and earlier lines of this same request.
    ///
    /// `available` is expressed in the requested unit, floored, so the
    /// message never promises a partial container.
    #[error(
        "Cannot return {requested} {unit} of {medicine}: only {available} {unit} still returnable"
    )]
    OverReturnRequested {
        medicine: String,
        requested: i64,
        unit: UnitType,
        available: i64,
    },

    /// Returns are only accepted during configured business hours.
    #[error("Returns are not accepted at hour {hour} (accepted {start_hour}:00-{end_hour}:00)")]
    OutsideAllowedHours {
        hour: u8,
        start_hour: u8,
        end_hour: u8,
    },

    /// The actor has filed too many returns today.
    #[error("Daily return limit reached for {actor}: {limit} per day")]
    DailyLimitExceeded { actor: String, limit: u32 },

    /// The refund total is below the configured minimum.
    #[error("Return amount {amount_cents} cents is below the minimum of {minimum_cents} cents")]
    BelowMinimumAmount { amount_cents: i64, minimum_cents: i64 },

    /// Input failed shape checks before any rule ran.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Shape problems in caller input.
///
/// Raised by `validation.rs` before the eligibility rules see the
/// request: empty reasons, zero quantities, ids that are not UUIDs, a
/// unit the medicine is not sold in. Field names in the messages are the
/// request's field names, so the host can map them back onto a form.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Empty or missing where a value is mandatory.
    #[error("{field} is required")]
    Required { field: String },

    /// Exceeds the column or form limit.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Outside the accepted numeric range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Zero or negative where only positive makes sense.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Not parseable as what the field claims to be, a UUID usually.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Outside the allowed set, such as a unit the medicine is not sold in.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Shorthand for fallible rule evaluations.
pub type ReturnResult<T> = Result<T, ReturnError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_return_message() {
        let err = ReturnError::OverReturnRequested {
            medicine: "Amoxicillin 500mg".to_string(),
            requested: 3,
            unit: UnitType::Container,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Cannot return 3 container of Amoxicillin 500mg: only 1 container still returnable"
        );
    }

    #[test]
    fn test_window_expired_message() {
        let err = ReturnError::ReturnWindowExpired {
            days_elapsed: 45,
            window_days: 30,
        };
        assert_eq!(
            err.to_string(),
            "Return window expired: sale is 45 days old, limit is 30"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "return_reason".to_string(),
        };
        assert_eq!(err.to_string(), "return_reason is required");

        let err = ValidationError::NotAllowed {
            field: "requested_unit".to_string(),
            allowed: vec!["individual".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "requested_unit must be one of: [\"individual\"]"
        );

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 10_000,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 10000");
    }

    #[test]
    fn test_validation_wraps_into_return_error() {
        let shape_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let err: ReturnError = shape_err.into();
        assert!(matches!(err, ReturnError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: quantity must be positive");
    }
}
