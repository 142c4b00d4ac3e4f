//! # Repository Module
//!
//! Database repository implementations for the Apotheca return engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  ReturnEngine                                                          │
//! │       │                                                                 │
//! │       │  db.returns().get_by_id(&id)                                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ReturnRepository                                                      │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── list(&self, filters)                                              │
//! │  ├── insert_header(conn, header)    ← transaction-scoped              │
//! │  └── next_sequence(conn, store, ..) ← transaction-scoped              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds of Methods
//!
//! Pool-backed methods (`&self`) grab a connection per call and suit
//! single-statement operations. Transaction-scoped associated functions take
//! a `&mut SqliteConnection` so the return engine can compose them into one
//! atomic unit: counter increment, header insert, line inserts, and the
//! sale flip all commit or roll back together.
//!
//! ## Available Repositories
//!
//! - [`store::StoreRepository`] - Store registry lookups
//! - [`medicine::MedicineRepository`] - Medicine catalog and dual-unit stock
//! - [`sale::SaleRepository`] - Sales and sale lines (read-mostly)
//! - [`returns::ReturnRepository`] - Returns, return lines, number counters

pub mod medicine;
pub mod returns;
pub mod sale;
pub mod store;
