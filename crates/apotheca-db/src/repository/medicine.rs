//! # Medicine Repository
//!
//! Catalog reads and dual-unit stock movements.
//!
//! ## Dual-Unit Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  medicines.container_stock    whole boxes/strips on the shelf           │
//! │  medicines.individual_stock   loose tablets in the dispensing drawer    │
//! │                                                                         │
//! │  The two counters never convert into each other here. A return of      │
//! │  2 containers bumps container_stock by 2; a return of 5 tablets bumps  │
//! │  individual_stock by 5. Any repackaging is a separate physical         │
//! │  process with its own paperwork.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use apotheca_core::types::Medicine;
use apotheca_core::units::UnitType;

use crate::error::{DbError, DbResult};

/// Every column of `medicines`, in FromRow order.
const MEDICINE_COLUMNS: &str = "\
    id, store_id, name, generic_name, batch_number, expiry_date, \
    sell_by_container, sell_by_individual, units_per_container, \
    container_price_cents, individual_price_cents, \
    container_stock, individual_stock, is_active, created_at, updated_at";

/// Repository for medicine database operations.
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    /// Creates a new MedicineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    /// Gets a medicine by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medicine>> {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1");

        let medicine = sqlx::query_as::<_, Medicine>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(medicine)
    }

    /// Gets every medicine referenced by a sale's lines.
    ///
    /// Pool-backed convenience over [`Self::fetch_for_sale`].
    pub async fn get_for_sale(&self, sale_id: &str) -> DbResult<Vec<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_for_sale(&mut conn, sale_id).await
    }

    /// Transaction-scoped variant of [`Self::get_for_sale`].
    ///
    /// Used by return creation to re-read medicines behind the write lock.
    pub async fn fetch_for_sale(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<Medicine>> {
        let sql = format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines \
             WHERE id IN (SELECT DISTINCT medicine_id FROM sale_lines WHERE sale_id = ?1)"
        );

        let medicines = sqlx::query_as::<_, Medicine>(&sql)
            .bind(sale_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(medicines)
    }

    /// Inserts a medicine.
    pub async fn insert(&self, medicine: &Medicine) -> DbResult<()> {
        debug!(id = %medicine.id, name = %medicine.name, "Inserting medicine");

        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, store_id, name, generic_name, batch_number, expiry_date,
                sell_by_container, sell_by_individual, units_per_container,
                container_price_cents, individual_price_cents,
                container_stock, individual_stock, is_active,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.store_id)
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(&medicine.batch_number)
        .bind(medicine.expiry_date)
        .bind(medicine.sell_by_container)
        .bind(medicine.sell_by_individual)
        .bind(medicine.units_per_container)
        .bind(medicine.container_price_cents)
        .bind(medicine.individual_price_cents)
        .bind(medicine.container_stock)
        .bind(medicine.individual_stock)
        .bind(medicine.is_active)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds restored quantity back to the stock counter for `unit`.
    ///
    /// ## Delta Update
    /// Deliberately `stock = stock + ?` rather than an absolute write:
    /// two restorations landing close together must both count.
    pub async fn restock(
        conn: &mut SqliteConnection,
        id: &str,
        unit: UnitType,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(id = %id, unit = %unit, quantity = %quantity, "Restocking medicine");

        let sql = match unit {
            UnitType::Container => {
                "UPDATE medicines \
                 SET container_stock = container_stock + ?2, updated_at = ?3 \
                 WHERE id = ?1"
            }
            UnitType::Individual => {
                "UPDATE medicines \
                 SET individual_stock = individual_stock + ?2, updated_at = ?3 \
                 WHERE id = ?1"
            }
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Medicine", id));
        }

        Ok(())
    }

    /// Deducts up to `quantity` from the stock counter for `unit`, never
    /// going below zero.
    ///
    /// Used when reversing a restoration after some of the restored stock
    /// has already been resold. Returns the quantity actually deducted so
    /// the caller can record the shortfall.
    pub async fn deduct_clamped(
        conn: &mut SqliteConnection,
        id: &str,
        unit: UnitType,
        quantity: i64,
    ) -> DbResult<i64> {
        let select = match unit {
            UnitType::Container => "SELECT container_stock FROM medicines WHERE id = ?1",
            UnitType::Individual => "SELECT individual_stock FROM medicines WHERE id = ?1",
        };

        let stock: i64 = sqlx::query_scalar(select)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Medicine", id))?;

        let deducted = quantity.min(stock).max(0);

        if deducted > 0 {
            let update = match unit {
                UnitType::Container => {
                    "UPDATE medicines \
                     SET container_stock = container_stock - ?2, updated_at = ?3 \
                     WHERE id = ?1"
                }
                UnitType::Individual => {
                    "UPDATE medicines \
                     SET individual_stock = individual_stock - ?2, updated_at = ?3 \
                     WHERE id = ?1"
                }
            };

            sqlx::query(update)
                .bind(id)
                .bind(deducted)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;
        }

        debug!(id = %id, unit = %unit, requested = %quantity, deducted = %deducted, "Deducted stock");

        Ok(deducted)
    }

    /// Counts active medicines (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new medicine ID.
pub fn generate_medicine_id() -> String {
    Uuid::new_v4().to_string()
}
