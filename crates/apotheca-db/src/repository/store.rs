//! # Store Repository
//!
//! Lookups against the store registry. The return engine reads stores for
//! one thing only: the short `code` that prefixes return numbers.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use apotheca_core::types::Store;

use crate::error::{DbError, DbResult};

/// Repository for store database operations.
#[derive(Debug, Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

impl StoreRepository {
    /// Creates a new StoreRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StoreRepository { pool }
    }

    /// Gets a store by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, name, code, created_at
            FROM stores
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    /// Gets a store by its short code (e.g. "PHX").
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, name, code, created_at
            FROM stores
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    /// Inserts a store.
    pub async fn insert(&self, store: &Store) -> DbResult<()> {
        debug!(id = %store.id, code = %store.code, "Inserting store");

        sqlx::query(
            r#"
            INSERT INTO stores (id, name, code, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&store.id)
        .bind(&store.name)
        .bind(&store.code)
        .bind(store.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a store by ID, failing if it does not exist.
    pub async fn require(&self, id: &str) -> DbResult<Store> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Store", id))
    }
}

/// Helper to generate a new store ID.
pub fn generate_store_id() -> String {
    Uuid::new_v4().to_string()
}
