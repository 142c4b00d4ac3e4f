//! # Validation Module
//!
//! Shape checks for incoming return requests.
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller / API edge      trims input, gives immediate feedback           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  THIS MODULE            required fields, lengths, id formats,           │
//! │                         quantity bounds. No database access.            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  crate::eligibility     rules that need the loaded sale: window,        │
//! │                         remaining quantities, unit conversions          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  SQLite                 NOT NULL / UNIQUE / CHECK / foreign keys        │
//! │                         as the last line of defense                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request that passes this module can still be refused by eligibility;
//! a request that fails here never touches the database.

use crate::error::ValidationError;
use crate::types::CreateReturnRequest;
use crate::{MAX_REASON_LENGTH, MAX_RETURN_ITEMS, MAX_RETURN_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks a return reason: present after trimming, and within the
/// `MAX_REASON_LENGTH` column bound.
///
/// ## Example
/// ```rust
/// use apotheca_core::validation::validate_return_reason;
///
/// assert!(validate_return_reason("damaged packaging").is_ok());
/// assert!(validate_return_reason("").is_err());
/// assert!(validate_return_reason(&"x".repeat(600)).is_err());
/// ```
pub fn validate_return_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "return_reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "return_reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(())
}

/// Checks an actor identifier, whoever is filing, approving, or
/// rejecting. Only presence is enforced; user management is the host
/// application's problem.
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    if actor.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "actor".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Checks a return line quantity: strictly positive and no larger than
/// `MAX_RETURN_LINE_QUANTITY`. The cap exists so a typo like 99999
/// tablets fails fast instead of producing an absurd over-return refusal
/// downstream.
pub fn validate_return_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_RETURN_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_RETURN_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Checks a tax or discount adjustment. Zero means no adjustment and is
/// fine; negative never is.
pub fn validate_adjustment_cents(cents: i64, field: &str) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Checks that `id` parses as a UUID, reporting under the given field
/// name so a bad `sale_id` and a bad `sale_line_id` read differently.
///
/// ## Example
/// ```rust
/// use apotheca_core::validation::validate_uuid;
///
/// assert!(validate_uuid("7f9b2c54-0d1e-4a8b-9c3d-5e6f7a8b9c0d", "sale_id").is_ok());
/// assert!(validate_uuid("not-a-uuid", "sale_id").is_err());
/// ```
pub fn validate_uuid(id: &str, field: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Full shape check of a create-return request, run before any data is
/// loaded:
///
/// - `sale_id` and every `sale_line_id` parse as UUIDs
/// - one to `MAX_RETURN_ITEMS` items, each with a quantity in range
/// - reason present and bounded, `processed_by` present
/// - tax and discount adjustments non-negative
///
/// Everything that needs the sale itself (window, remaining quantities,
/// unit rules) belongs to eligibility, not here.
pub fn validate_create_request(req: &CreateReturnRequest) -> ValidationResult<()> {
    validate_uuid(&req.sale_id, "sale_id")?;
    validate_return_reason(&req.return_reason)?;
    validate_actor(&req.processed_by)?;
    validate_adjustment_cents(req.tax_adjustment_cents, "tax_adjustment_cents")?;
    validate_adjustment_cents(req.discount_adjustment_cents, "discount_adjustment_cents")?;

    if req.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if req.items.len() > MAX_RETURN_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_RETURN_ITEMS as i64,
        });
    }

    for item in &req.items {
        validate_uuid(&item.sale_line_id, "sale_line_id")?;
        validate_return_quantity(item.quantity)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
