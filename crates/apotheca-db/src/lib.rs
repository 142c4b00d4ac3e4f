//! # apotheca-db: Database Layer for the Apotheca Return Engine
//!
//! SQLite persistence for returns, sales, medicines, and the return-number
//! counters, async throughout via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca Data Flow                                 │
//! │                                                                         │
//! │  ReturnEngine (apotheca-returns)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     apotheca-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (returns.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ ReturnRepo    │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │◄───│ SaleRepo      │    │ ...          │  │   │
//! │  │   │ Management    │    │ MedicineRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ./apotheca.db + -wal/-shm sidecars                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - `DbConfig` and the pooled `Database` handle
//! - [`migrations`] - Schema migrations compiled into the binary
//! - [`error`] - `DbError` and the sqlx error mapping
//! - [`repository`] - One repository per aggregate (returns, sale, medicine, store)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apotheca_db::{Database, DbConfig};
//!
//! // Open (and migrate) the store's database file
//! let db = Database::new(DbConfig::new("path/to/apotheca.db")).await?;
//!
//! // Repositories hang off the handle
//! let sale = db.sales().get_by_id(&sale_id).await?;
//! let prior = db.returns().get_returned_quantities(&sale_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::medicine::MedicineRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRepository;
pub use repository::store::StoreRepository;
