//! # Database Error Types
//!
//! `DbError` and the mapping out of raw sqlx errors.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error (driver level)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← classified: constraint? pool? migration?      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (apotheca-returns) ← merged with the domain rejections    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Host application picks a user-facing message per category             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
///
/// Constraint violations get their own variants because the return engine
/// branches on them: a duplicate return number retries with a fresh
/// sequence, a missing row aborts the operation.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row matched.
    ///
    /// Raised for plain lookups that found nothing, and for guarded
    /// UPDATEs whose WHERE clause filtered the row away (stale status,
    /// line already restored). The entity string names which.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index refused the write. Return numbers and invoice
    /// numbers are the usual suspects.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A foreign key refused the write: the referenced sale, medicine, or
    /// store row does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Could not open or create the database file. Usually permissions,
    /// a missing parent directory, or a full disk.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A migration did not apply cleanly.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A statement failed for a reason that is not one of the recognized
    /// constraint violations.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN, COMMIT, or ROLLBACK itself failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection is busy and the acquire timed out.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Anything the driver reports that has no better home here.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Builds a [`DbError::NotFound`] for the given entity and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Builds a [`DbError::UniqueViolation`].
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Classifies a database-level error by its message.
///
/// SQLite reports constraint failures as text
/// (`UNIQUE constraint failed: returns.return_number`,
/// `FOREIGN KEY constraint failed`), so the table.column for a unique
/// violation is parsed straight out of the message.
fn classify_database_error(message: &str) -> DbError {
    if let Some(field) = message.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::UniqueViolation {
            field: field.to_string(),
            value: "unknown".to_string(),
        };
    }

    if message.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }

    DbError::QueryFailed(message.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => classify_database_error(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
