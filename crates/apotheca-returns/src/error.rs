//! # Engine Error Types
//!
//! Error types for return orchestration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Rejection    │  │  Configuration  │  │     Infrastructure      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Domain         │  │  Policy         │  │  Db                     │ │
//! │  │  InvalidTrans.  │  │                 │  │  InventoryWriteFailed   │ │
//! │  │                 │  │                 │  │  PersistenceFailed      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Rejections are the caller's fault and safe to show the clerk.         │
//! │  Infrastructure failures are the system's fault and page someone.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use apotheca_core::error::{ReturnError, ValidationError};
use apotheca_core::policy::PolicyError;
use apotheca_core::types::ReturnStatus;
use apotheca_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type covering all return-orchestration failures.
///
/// ## Design Principles
/// - Domain rejections keep their structured variants so callers can
///   branch on them (the UI wording differs per rejection)
/// - Infrastructure failures carry enough context for debugging
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Domain Rejections
    // =========================================================================
    /// A business rule rejected the request (window expired, over-return,
    /// daily cap, bad input, and so on). The inner error says which.
    #[error("{0}")]
    Domain(#[from] ReturnError),

    /// The requested status change is not a legal lifecycle step.
    #[error("Cannot move return from {from} to {to}")]
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// The return policy failed validation at engine construction.
    #[error("Invalid return policy: {0}")]
    Policy(#[from] PolicyError),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// A database operation failed.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// A stock adjustment could not be applied.
    #[error("Inventory write failed for {medicine}: {detail}")]
    InventoryWriteFailed { medicine: String, detail: String },

    /// A committed write could not be read back.
    #[error("Persistence verification failed: {0}")]
    PersistenceFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Domain(ReturnError::Validation(err))
    }
}

/// Raw sqlx errors surface at transaction begin/commit; everything else
/// comes pre-wrapped as [`DbError`] by the repositories.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Returns true if this error is a rejection of the caller's request
    /// rather than a system failure.
    ///
    /// ## Rejections
    /// - Eligibility and policy rule violations
    /// - Input validation failures
    /// - Illegal lifecycle transitions
    ///
    /// ## Not Rejections
    /// - Database failures
    /// - Stock writes that could not be applied
    /// - Bad engine configuration
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Domain(_) | EngineError::InvalidTransition { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, EngineError::Policy(_))
    }
}
