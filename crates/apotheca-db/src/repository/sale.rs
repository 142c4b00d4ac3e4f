//! # Sale Repository
//!
//! Database operations for sales and sale lines.
//!
//! ## What the Return Engine Touches
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Sales are read-mostly collaborator data                 │
//! │                                                                         │
//! │  READ                                                                  │
//! │    └── get_by_id() / get_lines()  → eligibility, availability, drafts  │
//! │                                                                         │
//! │  WRITE (exactly one, one-way)                                          │
//! │    └── mark_returned() → Sale { status: Returned, is_returned: true }  │
//! │        Fires only when every line is fully consumed by returns.        │
//! │        Never unset, even if a later return is rejected.                │
//! │                                                                         │
//! │  INSERT                                                                │
//! │    └── insert_sale() / insert_line() → seed data and test fixtures     │
//! │        (production sales are written by the POS, not this engine)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use apotheca_core::types::{Sale, SaleLine};

use crate::error::DbResult;

/// Every column of `sales`, in FromRow order.
const SALE_COLUMNS: &str = "\
    id, store_id, customer_id, invoice_number, status, is_returned, \
    subtotal_cents, total_cents, sale_date, created_at, updated_at";

/// Every column of `sale_lines`, in FromRow order.
const SALE_LINE_COLUMNS: &str = "\
    id, sale_id, medicine_id, medicine_name, batch_number, \
    quantity, unit_type, unit_price_cents, line_total_cents, created_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Transaction-scoped variant of [`Self::get_by_id`].
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(sale)
    }

    /// Gets a sale by its invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets all lines for a sale.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_lines(&mut conn, sale_id).await
    }

    /// Transaction-scoped variant of [`Self::get_lines`].
    pub async fn fetch_lines(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {SALE_LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY created_at"
        );

        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(lines)
    }

    /// Inserts a sale directly (seed data and fixtures).
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, invoice_number = %sale.invoice_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, store_id, customer_id, invoice_number, status, is_returned,
                subtotal_cents, total_cents, sale_date, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.customer_id)
        .bind(&sale.invoice_number)
        .bind(sale.status)
        .bind(sale.is_returned)
        .bind(sale.subtotal_cents)
        .bind(sale.total_cents)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds a line to a sale.
    ///
    /// ## Snapshot Pattern
    /// Medicine details (name, batch, price) are copied onto the line.
    /// This preserves the sale history even if the catalog changes later.
    pub async fn insert_line(&self, line: &SaleLine) -> DbResult<()> {
        debug!(sale_id = %line.sale_id, medicine_id = %line.medicine_id, "Adding sale line");

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, medicine_id, medicine_name, batch_number,
                quantity, unit_type, unit_price_cents, line_total_cents, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10
            )
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.medicine_id)
        .bind(&line.medicine_name)
        .bind(&line.batch_number)
        .bind(line.quantity)
        .bind(line.unit_type)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flips a sale to returned. One-way: a sale already marked returned is
    /// left untouched, so the flip never un-happens and double marking is
    /// harmless.
    ///
    /// ## Returns
    /// `true` if this call performed the flip, `false` if the sale was
    /// already marked (or does not exist).
    pub async fn mark_returned(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = 'returned',
                is_returned = 1,
                updated_at = ?2
            WHERE id = ?1 AND status != 'returned'
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Helper to generate a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new sale line ID.
pub fn generate_sale_line_id() -> String {
    Uuid::new_v4().to_string()
}
