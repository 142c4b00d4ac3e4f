//! # Database Pool Management
//!
//! `DbConfig` and the `Database` handle that owns the SQLite pool.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path)            pick pool sizes, timeouts               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Database::new(config).await    open pool, apply pending migrations     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  db.stores() / db.medicines() / db.sales() / db.returns()               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  repositories share the pool; return creation checks out one            │
//! │  connection and holds the write lock for its whole transaction          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! The pool runs in WAL mode, so counter lookups and return listings read
//! concurrently while a creation transaction writes. Writers still
//! serialize against each other, and return creation relies on that: the
//! sequence-counter UPDATE is the first statement of the creation
//! transaction, so two clerks returning against the same sale queue up
//! instead of double-spending the remaining quantity. `busy_timeout` gives
//! the queued writer time to wait instead of failing immediately.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::medicine::MedicineRepository;
use crate::repository::returns::ReturnRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::store::StoreRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool and connection settings.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/apotheca/apotheca.db")
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Where the SQLite file lives. Created on first open.
    pub database_path: PathBuf,

    /// Pool ceiling. Five is plenty for one back-office node; SQLite
    /// only admits one writer at a time anyway.
    pub max_connections: u32,

    /// Connections kept warm between requests. Default: 1.
    pub min_connections: u32,

    /// How long an acquire may wait for a free connection. Default: 30s.
    pub connect_timeout: Duration,

    /// Idle connections are recycled after this long. Default: 10 minutes.
    pub idle_timeout: Duration,

    /// How long a writer waits for the SQLite write lock before giving up.
    /// Default: 5 seconds.
    pub busy_timeout: Duration,

    /// Apply pending migrations during `Database::new`. Default: true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration with production defaults for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Overrides the pool ceiling.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Overrides the warm-connection floor.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Overrides the acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the SQLite write-lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enables or disables migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Configuration for an in-memory database.
    ///
    /// Each test gets a private, empty database that vanishes on drop.
    /// The pool is pinned to a single connection because a second
    /// `:memory:` connection would open a second, unrelated database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the pooled SQLite database.
///
/// All repositories hang off this one value:
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./apotheca.db")).await?;
///
/// let sale = db.sales().get_by_id("...").await?;
/// let open = db.returns().list(&ReturnFilters::default()).await?;
/// ```
///
/// Cloning is cheap: the handle is an `Arc`-backed pool underneath, so it
/// can be handed to every request handler without ceremony.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Translates the config into sqlx connect options.
///
/// The pragmas matter for the return workload:
/// - WAL journal so listings read while a creation transaction writes
/// - NORMAL synchronous, durable against corruption while keeping writes fast
/// - foreign keys ON (SQLite ships with them off), so a return line can
///   never reference a deleted sale or medicine
/// - busy timeout from config, see the module doc on writer queueing
fn build_connect_options(config: &DbConfig) -> DbResult<SqliteConnectOptions> {
    // mode=rwc: read, write, create on first open
    let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

    let options = SqliteConnectOptions::from_str(&connect_url)
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout)
        .create_if_missing(true);

    Ok(options)
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    ///
    /// The database file is created when absent, so a fresh install needs
    /// no manual setup: point the config at a writable path and the first
    /// open produces a fully migrated, empty database.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = build_connect_options(&config)?;
        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations.
    ///
    /// `new()` already calls this when `run_migrations` is set; call it
    /// directly only when migrations were deliberately deferred.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// The raw connection pool.
    ///
    /// Needed for multi-statement transactions (`pool().begin()`); the
    /// return engine uses it for the creation and reversal transactions.
    /// Everything else should go through a repository.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repository for stores.
    pub fn stores(&self) -> StoreRepository {
        StoreRepository::new(self.pool.clone())
    }

    /// Repository for medicines and their stock counters.
    pub fn medicines(&self) -> MedicineRepository {
        MedicineRepository::new(self.pool.clone())
    }

    /// Repository for sales and sale lines.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Repository for returns, return lines, and the number counters.
    pub fn returns(&self) -> ReturnRepository {
        ReturnRepository::new(self.pool.clone())
    }

    /// Drains and closes the pool. Repository calls fail afterwards, so
    /// this belongs at the very end of shutdown.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_migrates_and_responds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder_overrides() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(config.run_migrations);
    }
}
