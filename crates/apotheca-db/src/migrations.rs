//! # Database Migrations
//!
//! The Apotheca schema, compiled into the binary.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Database::new()                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  _sqlx_migrations bookkeeping table (created on first run)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Diff embedded files against applied rows                              │
//! │       │                                                                 │
//! │       ├── 001_initial_schema.sql ✓ already applied → skip              │
//! │       └── anything newer          ⬜ pending → run, in filename order   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Each pending migration commits inside its own transaction             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding a Migration
//!
//! Drop `NNN_description.sql` into `migrations/sqlite/` with the next
//! number. Applied migrations are immutable: a schema change is always a
//! NEW file, never an edit to an old one, or checksums diverge on every
//! already-migrated store database.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// All SQL files under `migrations/sqlite`, embedded at compile time by
/// `sqlx::migrate!()`. A deployed back office carries its schema with it;
/// there is no migrations directory to ship or lose.
///
/// ```text
/// migrations/sqlite/
/// └── 001_initial_schema.sql  # stores, medicines, sales, returns, counters
/// ```
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Brings the database up to the embedded schema version.
///
/// Safe to call on every startup: already-applied migrations are skipped
/// by checksum, pending ones run in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Reports `(embedded, applied)` migration counts for diagnostics.
///
/// A missing bookkeeping table reads as zero applied rather than an error,
/// so health checks work against a database that was never migrated.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
