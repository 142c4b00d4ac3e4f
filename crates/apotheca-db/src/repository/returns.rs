//! # Return Repository
//!
//! Database operations for return headers, return lines, and the
//! return-number sequence counters.
//!
//! ## Creation Is One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Return Creation (engine-driven, single txn)                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    1. next_sequence()        ← FIRST write: takes the SQLite write      │
//! │    │                            lock, so concurrent creations against   │
//! │    │                            the same sale serialize here            │
//! │    2. re-read sale + lines + prior returned quantities                  │
//! │    3. restock() per restorable line (best effort, failures flagged)     │
//! │    4. insert_header() / insert_line() × N with restoration outcomes     │
//! │    5. mark_returned() on the sale, if now fully consumed                │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  A rollback abandons everything at once: the sequence bump, the shelf   │
//! │  adjustments, the rows. Numbers may skip but are never reissued, and    │
//! │  stock never moves for a return that was not recorded.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarded Updates
//! Status stamps and line restoration flags use conditional UPDATEs
//! (`WHERE ... AND status = 'pending'`, `AND inventory_restored = 0`).
//! The WHERE clause is the concurrency backstop: whichever caller loses the
//! race affects zero rows and is told so, instead of double-stamping.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use apotheca_core::types::{
    RefundMethod, RefundStatus, RestorationStatus, Return, ReturnFilters, ReturnLine,
    ReturnedQuantity,
};

use crate::error::{DbError, DbResult};

/// Every column of `returns`, in FromRow order.
const RETURN_COLUMNS: &str = "\
    id, store_id, sale_id, return_number, customer_id, status, \
    subtotal_cents, tax_adjustment_cents, discount_adjustment_cents, \
    total_return_amount_cents, return_reason, \
    refund_method, refund_status, refund_reference, refund_processed_at, \
    restore_inventory, inventory_restoration_status, requires_manager_approval, \
    processed_by, approved_by, approved_at, completed_by, completed_at, \
    rejected_by, rejected_at, rejection_reason, notes, created_at, updated_at";

/// Every column of `return_lines`, in FromRow order.
const RETURN_LINE_COLUMNS: &str = "\
    id, return_id, sale_line_id, medicine_id, medicine_name, batch_number, \
    return_quantity, unit_type, original_quantity, original_unit_type, \
    unit_price_cents, return_amount_cents, restore_to_inventory, \
    inventory_restored, inventory_reversed, restored_at, restored_by, \
    restored_containers, restored_individual, reversed_at, reversed_by, \
    reversed_quantity, reversal_reason, created_at";

/// Repository for return database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    // ====== Reads ======

    /// Gets a return by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Return>> {
        let sql = format!("SELECT {RETURN_COLUMNS} FROM returns WHERE id = ?1");

        let ret = sqlx::query_as::<_, Return>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ret)
    }

    /// Gets a return by its business number (e.g. "RET-PHX-2608-0042").
    pub async fn get_by_number(&self, return_number: &str) -> DbResult<Option<Return>> {
        let sql = format!("SELECT {RETURN_COLUMNS} FROM returns WHERE return_number = ?1");

        let ret = sqlx::query_as::<_, Return>(&sql)
            .bind(return_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ret)
    }

    /// Gets all lines for a return.
    pub async fn get_lines(&self, return_id: &str) -> DbResult<Vec<ReturnLine>> {
        let sql = format!(
            "SELECT {RETURN_LINE_COLUMNS} FROM return_lines WHERE return_id = ?1 ORDER BY created_at"
        );

        let lines = sqlx::query_as::<_, ReturnLine>(&sql)
            .bind(return_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    /// Transaction-scoped single-line read.
    ///
    /// Retry and reversal passes re-read the line behind the write lock so
    /// the idempotency flags they act on are current, not a stale snapshot.
    pub async fn fetch_line(
        conn: &mut SqliteConnection,
        line_id: &str,
    ) -> DbResult<Option<ReturnLine>> {
        let sql = format!("SELECT {RETURN_LINE_COLUMNS} FROM return_lines WHERE id = ?1");

        let line = sqlx::query_as::<_, ReturnLine>(&sql)
            .bind(line_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(line)
    }

    /// Lists returns matching the given filters, newest first.
    ///
    /// Every filter is optional; `?N IS NULL` short-circuits the ones left
    /// unset. Page size comes pre-clamped from [`ReturnFilters`].
    pub async fn list(&self, filters: &ReturnFilters) -> DbResult<Vec<Return>> {
        let sql = format!(
            r#"
            SELECT {RETURN_COLUMNS} FROM returns
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR sale_id = ?2)
              AND (?3 IS NULL OR store_id = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR created_at <= ?5)
            ORDER BY created_at DESC
            LIMIT ?6 OFFSET ?7
            "#
        );

        let returns = sqlx::query_as::<_, Return>(&sql)
            .bind(filters.status)
            .bind(&filters.sale_id)
            .bind(&filters.store_id)
            .bind(filters.from)
            .bind(filters.to)
            .bind(filters.effective_limit())
            .bind(filters.effective_offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(returns)
    }

    /// Quantities already returned against a sale, line by line, in the
    /// frame each return was requested in.
    ///
    /// Rejected and cancelled returns release their claim and are excluded.
    pub async fn get_returned_quantities(&self, sale_id: &str) -> DbResult<Vec<ReturnedQuantity>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_returned_quantities(&mut conn, sale_id).await
    }

    /// Transaction-scoped variant of [`Self::get_returned_quantities`].
    ///
    /// Return creation calls this behind the write lock so the availability
    /// re-check cannot race another creation against the same sale.
    pub async fn fetch_returned_quantities(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<ReturnedQuantity>> {
        let quantities = sqlx::query_as::<_, ReturnedQuantity>(
            r#"
            SELECT rl.sale_line_id, rl.return_quantity AS quantity, rl.unit_type
            FROM return_lines rl
            JOIN returns r ON r.id = rl.return_id
            WHERE r.sale_id = ?1
              AND r.status NOT IN ('rejected', 'cancelled')
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(quantities)
    }

    /// Counts returns filed by an actor since a cutoff (daily-cap check).
    pub async fn count_by_processor_since(
        &self,
        processed_by: &str,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM returns WHERE processed_by = ?1 AND created_at >= ?2",
        )
        .bind(processed_by)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // ====== Creation (transaction-scoped) ======

    /// Allocates the next return sequence number for (store, period).
    ///
    /// ## Ordering Requirement
    /// Must be the FIRST write of the creation transaction. The UPSERT takes
    /// the SQLite write lock, which is what serializes two clerks filing
    /// returns against the same sale at the same moment. If the transaction
    /// later rolls back, the bump is abandoned with it: sequences may have
    /// gaps, but a number is never handed out twice.
    pub async fn next_sequence(
        conn: &mut SqliteConnection,
        store_id: &str,
        period: &str,
    ) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO return_counters (store_id, period, seq)
            VALUES (?1, ?2, 1)
            ON CONFLICT(store_id, period) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(store_id)
        .bind(period)
        .fetch_one(&mut *conn)
        .await?;

        debug!(store_id = %store_id, period = %period, seq = %seq, "Allocated return sequence");

        Ok(seq)
    }

    /// Inserts a return header.
    pub async fn insert_header(conn: &mut SqliteConnection, header: &Return) -> DbResult<()> {
        debug!(id = %header.id, return_number = %header.return_number, "Inserting return");

        sqlx::query(
            r#"
            INSERT INTO returns (
                id, store_id, sale_id, return_number, customer_id, status,
                subtotal_cents, tax_adjustment_cents, discount_adjustment_cents,
                total_return_amount_cents, return_reason,
                refund_method, refund_status, refund_reference, refund_processed_at,
                restore_inventory, inventory_restoration_status, requires_manager_approval,
                processed_by, approved_by, approved_at, completed_by, completed_at,
                rejected_by, rejected_at, rejection_reason, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20, ?21, ?22, ?23,
                ?24, ?25, ?26, ?27, ?28, ?29
            )
            "#,
        )
        .bind(&header.id)
        .bind(&header.store_id)
        .bind(&header.sale_id)
        .bind(&header.return_number)
        .bind(&header.customer_id)
        .bind(header.status)
        .bind(header.subtotal_cents)
        .bind(header.tax_adjustment_cents)
        .bind(header.discount_adjustment_cents)
        .bind(header.total_return_amount_cents)
        .bind(&header.return_reason)
        .bind(header.refund_method)
        .bind(header.refund_status)
        .bind(&header.refund_reference)
        .bind(header.refund_processed_at)
        .bind(header.restore_inventory)
        .bind(header.inventory_restoration_status)
        .bind(header.requires_manager_approval)
        .bind(&header.processed_by)
        .bind(&header.approved_by)
        .bind(header.approved_at)
        .bind(&header.completed_by)
        .bind(header.completed_at)
        .bind(&header.rejected_by)
        .bind(header.rejected_at)
        .bind(&header.rejection_reason)
        .bind(&header.notes)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a return line.
    pub async fn insert_line(conn: &mut SqliteConnection, line: &ReturnLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO return_lines (
                id, return_id, sale_line_id, medicine_id, medicine_name, batch_number,
                return_quantity, unit_type, original_quantity, original_unit_type,
                unit_price_cents, return_amount_cents, restore_to_inventory,
                inventory_restored, inventory_reversed, restored_at, restored_by,
                restored_containers, restored_individual, reversed_at, reversed_by,
                reversed_quantity, reversal_reason, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21,
                ?22, ?23, ?24
            )
            "#,
        )
        .bind(&line.id)
        .bind(&line.return_id)
        .bind(&line.sale_line_id)
        .bind(&line.medicine_id)
        .bind(&line.medicine_name)
        .bind(&line.batch_number)
        .bind(line.return_quantity)
        .bind(line.unit_type)
        .bind(line.original_quantity)
        .bind(line.original_unit_type)
        .bind(line.unit_price_cents)
        .bind(line.return_amount_cents)
        .bind(line.restore_to_inventory)
        .bind(line.inventory_restored)
        .bind(line.inventory_reversed)
        .bind(line.restored_at)
        .bind(&line.restored_by)
        .bind(line.restored_containers)
        .bind(line.restored_individual)
        .bind(line.reversed_at)
        .bind(&line.reversed_by)
        .bind(line.reversed_quantity)
        .bind(&line.reversal_reason)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // ====== Lifecycle Stamps ======

    /// Approves a pending return.
    pub async fn mark_approved(&self, id: &str, actor: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'approved',
                approved_by = ?2,
                approved_at = ?3,
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (pending)", id));
        }

        Ok(())
    }

    /// Moves an approved return to processed, optionally advancing the
    /// refund status with it.
    pub async fn mark_processed(
        &self,
        id: &str,
        refund_status: Option<RefundStatus>,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'processed',
                refund_status = COALESCE(?3, refund_status),
                updated_at = ?2
            WHERE id = ?1 AND status = 'approved'
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(refund_status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (approved)", id));
        }

        Ok(())
    }

    /// Completes a return from approved or processed.
    ///
    /// If `refund_status` lands on completed, `refund_processed_at` is
    /// stamped once and then left alone.
    pub async fn mark_completed(
        &self,
        id: &str,
        actor: &str,
        refund_status: Option<RefundStatus>,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'completed',
                completed_by = ?2,
                completed_at = ?3,
                refund_status = COALESCE(?4, refund_status),
                refund_processed_at = CASE
                    WHEN ?4 = 'completed' AND refund_processed_at IS NULL THEN ?3
                    ELSE refund_processed_at
                END,
                updated_at = ?3
            WHERE id = ?1 AND status IN ('approved', 'processed')
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(now)
        .bind(refund_status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (approved/processed)", id));
        }

        Ok(())
    }

    /// Rejects a pending return, recording who and why.
    pub async fn mark_rejected(&self, id: &str, actor: &str, reason: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'rejected',
                rejected_by = ?2,
                rejected_at = ?3,
                rejection_reason = ?4,
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(now)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (pending)", id));
        }

        Ok(())
    }

    /// Cancels a pending return. Restored stock stays on the shelf; the
    /// quantity claim is released by the status change alone.
    pub async fn mark_cancelled(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                status = 'cancelled',
                updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return (pending)", id));
        }

        Ok(())
    }

    // ====== Refund & Restoration Metadata ======

    /// Updates refund settlement fields. `None` leaves a field untouched.
    pub async fn update_refund(
        &self,
        id: &str,
        refund_status: Option<RefundStatus>,
        refund_method: Option<RefundMethod>,
        refund_reference: Option<&str>,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE returns SET
                refund_status = COALESCE(?2, refund_status),
                refund_method = COALESCE(?3, refund_method),
                refund_reference = COALESCE(?4, refund_reference),
                refund_processed_at = CASE
                    WHEN ?2 = 'completed' AND refund_processed_at IS NULL THEN ?5
                    ELSE refund_processed_at
                END,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(refund_status)
        .bind(refund_method)
        .bind(refund_reference)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return", id));
        }

        Ok(())
    }

    /// Writes the header-level restoration outcome.
    pub async fn update_restoration_status(
        &self,
        id: &str,
        status: RestorationStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE returns SET
                inventory_restoration_status = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Return", id));
        }

        Ok(())
    }

    /// Claims a line for restoration and records what went back on the
    /// shelf. The `inventory_restored = 0` guard makes a second attempt a
    /// no-op, which is what keeps retries from double-stocking.
    ///
    /// ## Returns
    /// `true` if this call claimed the line, `false` if it was already
    /// restored (or already reversed).
    pub async fn mark_line_restored(
        conn: &mut SqliteConnection,
        line_id: &str,
        actor: &str,
        restored_containers: i64,
        restored_individual: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE return_lines SET
                inventory_restored = 1,
                restored_at = ?2,
                restored_by = ?3,
                restored_containers = ?4,
                restored_individual = ?5
            WHERE id = ?1 AND inventory_restored = 0 AND inventory_reversed = 0
            "#,
        )
        .bind(line_id)
        .bind(Utc::now())
        .bind(actor)
        .bind(restored_containers)
        .bind(restored_individual)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claims a restored line for reversal, recording how much actually
    /// came back off the shelf (may be less than restored if some was
    /// resold in between).
    ///
    /// Reversal also clears `inventory_restored`: the flag pair
    /// (restored=0, reversed=1) reads as "stock pulled back", and the
    /// reversed flag keeps retry passes from restoring the line again.
    ///
    /// ## Returns
    /// `true` if this call claimed the line, `false` if the line was never
    /// restored or was already reversed.
    pub async fn mark_line_reversed(
        conn: &mut SqliteConnection,
        line_id: &str,
        actor: &str,
        reversed_quantity: i64,
        reason: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE return_lines SET
                inventory_restored = 0,
                inventory_reversed = 1,
                reversed_at = ?2,
                reversed_by = ?3,
                reversed_quantity = ?4,
                reversal_reason = ?5
            WHERE id = ?1 AND inventory_restored = 1 AND inventory_reversed = 0
            "#,
        )
        .bind(line_id)
        .bind(Utc::now())
        .bind(actor)
        .bind(reversed_quantity)
        .bind(reason)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Helper to generate a new return ID.
pub fn generate_return_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new return line ID.
pub fn generate_return_line_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
