//! # apotheca-returns: Return Lifecycle Engine
//!
//! This crate orchestrates pharmacy returns end to end: transactional
//! creation with sequential numbering, dual-unit stock restoration, the
//! approval lifecycle, and post-rejection stock reversal. Pure domain
//! rules come from `apotheca-core`; SQL comes from `apotheca-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca Return Flow                               │
//! │                                                                         │
//! │  Host application (POS back office, HTTP layer, CLI)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apotheca-returns (THIS CRATE)                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  ReturnEngine │    │   restore.rs  │    │ lifecycle.rs │  │   │
//! │  │   │  (engine.rs)  │    │               │    │              │  │   │
//! │  │   │               │    │ restoration + │    │ status graph │  │   │
//! │  │   │ transactions  │───►│ reversal      │    │ + guards     │  │   │
//! │  │   │ ids, clock    │    │ passes        │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                    │   │
//! │  │           │            ┌───────────────┐    ┌──────────────┐  │   │
//! │  │           └───────────►│   number.rs   │    │   error.rs   │  │   │
//! │  │                        │ RET-PHX-2608- │    │ EngineError  │  │   │
//! │  │                        │ 0001          │    │              │  │   │
//! │  │                        └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                              │                                  │
//! │       ▼                              ▼                                  │
//! │  apotheca-core (pure rules)     apotheca-db (SQLite/sqlx)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The [`ReturnEngine`] and every public operation
//! - [`restore`] - Restoration and reversal passes over return lines
//! - [`lifecycle`] - The status transition graph
//! - [`number`] - Return-number formatting and the counter fallback
//! - [`error`] - [`EngineError`] and its classification helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apotheca_core::policy::ReturnPolicy;
//! use apotheca_db::{Database, DbConfig};
//! use apotheca_returns::ReturnEngine;
//!
//! let db = Database::new(DbConfig::new("path/to/apotheca.db")).await?;
//! let engine = ReturnEngine::new(db, ReturnPolicy::load_from_env()?)?;
//!
//! // Check first, then file.
//! let outcome = engine.validate_eligibility(&sale_id, &items).await?;
//! let created = engine.create_return(request).await?;
//! println!("filed {}", created.header.return_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod number;
pub mod restore;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{EligibilityOutcome, ReturnEngine};
pub use error::{EngineError, EngineResult};
pub use restore::{RestorationOutcome, ReversalOutcome};

// Lifecycle helpers for hosts that want to render valid next actions
pub use lifecycle::{allowed_transitions, can_transition};
