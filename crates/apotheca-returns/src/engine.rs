//! # Return Engine
//!
//! The orchestration layer: every return operation the host application
//! calls goes through [`ReturnEngine`]. Pure decisions live in
//! apotheca-core, SQL lives in apotheca-db, and this module owns the
//! clock, the ids, and the transaction boundaries that tie them together.
//!
//! ## Create-Return Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_return(request)                           │
//! │                                                                         │
//! │  validate input ─► hour gate ─► daily cap ─► sale + store exist         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    next_sequence()          ← first write takes the SQLite write lock   │
//! │    re-read sale / lines / medicines / return history                    │
//! │    check_eligibility()      ← core, pure                                │
//! │    build_return_draft()     ← core, pure                                │
//! │    minimum-amount gate                                                  │
//! │    restore_lines()          ← stock back on the shelf                   │
//! │    insert_header / insert_line × N                                      │
//! │    mark_returned() if the sale is now fully consumed                    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  read back ─► ReturnAggregate                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything between BEGIN and COMMIT sees one consistent snapshot and
//! lands together or not at all. The pre-transaction gates are advisory
//! reads that keep obviously doomed requests from ever taking the write
//! lock; each one is re-checked or FK-enforced inside the transaction
//! where it matters.

use chrono::{NaiveTime, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use apotheca_core::availability::{available_for_return, AvailableLine};
use apotheca_core::draft::build_return_draft;
use apotheca_core::eligibility::{check_eligibility, EligibilityReport};
use apotheca_core::error::{ReturnError, ValidationError};
use apotheca_core::policy::ReturnPolicy;
use apotheca_core::reconcile::sale_fully_returned;
use apotheca_core::types::{
    CreateReturnRequest, RefundStatus, RestorationStatus, Return, ReturnAggregate, ReturnFilters,
    ReturnLine, ReturnLineRequest, ReturnStatus, ReturnedQuantity, SaleAggregate,
    UpdateRefundRequest, UpdateReturnStatusRequest,
};
use apotheca_core::validation::{validate_actor, validate_create_request};
use apotheca_db::repository::returns::{generate_return_id, generate_return_line_id};
use apotheca_db::{Database, DbError, MedicineRepository, ReturnRepository, SaleRepository};

use crate::error::{EngineError, EngineResult};
use crate::lifecycle::validate_transition;
use crate::number::{fallback_sequence, format_return_number, period_tag, store_prefix};
use crate::restore::{restore_lines, retry_restoration, reverse_restoration};

/// Reason stamped on reversed lines. The header keeps the clerk's
/// free-text rejection reason; the line records the mechanical cause.
const REVERSAL_REASON: &str = "Return rejected";

// =============================================================================
// Eligibility Outcome
// =============================================================================

/// A passing eligibility verdict plus the sale snapshot it was computed
/// from, so the caller can render the return screen without re-fetching.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityOutcome {
    pub report: EligibilityReport,
    pub sale: SaleAggregate,
}

// =============================================================================
// Return Engine
// =============================================================================

/// The return engine. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ReturnEngine {
    db: Database,
    policy: ReturnPolicy,
}

impl ReturnEngine {
    /// Creates an engine over an opened database.
    ///
    /// The policy is validated here, once, so a misconfigured window or a
    /// negative minimum fails loudly at startup instead of on the first
    /// return of the day.
    pub fn new(db: Database, policy: ReturnPolicy) -> EngineResult<Self> {
        policy.validate()?;
        Ok(ReturnEngine { db, policy })
    }

    /// The policy this engine enforces.
    pub fn policy(&self) -> &ReturnPolicy {
        &self.policy
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loads a sale with its lines and medicines, or names the unknown id.
    async fn load_sale_aggregate(&self, sale_id: &str) -> EngineResult<SaleAggregate> {
        let sale = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| ReturnError::SaleNotFound(sale_id.to_string()))?;
        let lines = self.db.sales().get_lines(sale_id).await?;
        let medicines = self.db.medicines().get_for_sale(sale_id).await?;

        Ok(SaleAggregate {
            sale,
            lines,
            medicines,
        })
    }

    /// Loads a return header, or names the unknown id.
    async fn require_return(&self, return_id: &str) -> EngineResult<Return> {
        let ret = self
            .db
            .returns()
            .get_by_id(return_id)
            .await?
            .ok_or_else(|| DbError::not_found("Return", return_id))?;
        Ok(ret)
    }

    /// Checks a prospective return without filing anything.
    ///
    /// The verdict is advisory: creation re-runs every check behind the
    /// write lock, so a concurrent return can still shrink availability
    /// between this call and [`Self::create_return`].
    pub async fn validate_eligibility(
        &self,
        sale_id: &str,
        items: &[ReturnLineRequest],
    ) -> EngineResult<EligibilityOutcome> {
        let aggregate = self.load_sale_aggregate(sale_id).await?;
        let returned = self.db.returns().get_returned_quantities(sale_id).await?;

        let report = check_eligibility(&aggregate, items, &returned, &self.policy, Utc::now())?;

        Ok(EligibilityOutcome {
            report,
            sale: aggregate,
        })
    }

    /// What is still returnable on each line of a sale, in both units.
    pub async fn list_available_for_return(
        &self,
        sale_id: &str,
    ) -> EngineResult<Vec<AvailableLine>> {
        let aggregate = self.load_sale_aggregate(sale_id).await?;
        let returned = self.db.returns().get_returned_quantities(sale_id).await?;

        Ok(available_for_return(&aggregate, &returned)?)
    }

    /// Loads a return with its lines.
    pub async fn get_return(&self, return_id: &str) -> EngineResult<ReturnAggregate> {
        let header = self.require_return(return_id).await?;
        let lines = self.db.returns().get_lines(return_id).await?;

        Ok(ReturnAggregate { header, lines })
    }

    /// Loads a return by the business number printed on the slip.
    pub async fn get_return_by_number(&self, return_number: &str) -> EngineResult<ReturnAggregate> {
        let header = self
            .db
            .returns()
            .get_by_number(return_number)
            .await?
            .ok_or_else(|| DbError::not_found("Return", return_number))?;
        let lines = self.db.returns().get_lines(&header.id).await?;

        Ok(ReturnAggregate { header, lines })
    }

    /// Lists returns for a store, newest first.
    ///
    /// The store argument always wins over whatever the filter carries, so
    /// a caller can never list another store's returns by mistake.
    pub async fn list_returns(
        &self,
        store_id: &str,
        mut filters: ReturnFilters,
    ) -> EngineResult<Vec<Return>> {
        filters.store_id = Some(store_id.to_string());
        Ok(self.db.returns().list(&filters).await?)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Files a return: one transaction, one number, best-effort stock
    /// restoration, and sale reconciliation. See the module docs for the
    /// transaction layout.
    ///
    /// On success the return is re-read from the database, so the caller
    /// holds exactly what was persisted.
    pub async fn create_return(
        &self,
        request: CreateReturnRequest,
    ) -> EngineResult<ReturnAggregate> {
        validate_create_request(&request)?;

        let now = Utc::now();

        // Hour gate first: cheapest check, no I/O.
        if let Some(window) = self.policy.allowed_hours {
            let hour = now.hour() as u8;
            if !window.contains(hour) {
                return Err(ReturnError::OutsideAllowedHours {
                    hour,
                    start_hour: window.start_hour,
                    end_hour: window.end_hour,
                }
                .into());
            }
        }

        // Daily cap, counted from the start of the UTC calendar day.
        if let Some(limit) = self.policy.daily_limit() {
            let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            let filed = self
                .db
                .returns()
                .count_by_processor_since(&request.processed_by, day_start)
                .await?;
            if filed >= i64::from(limit) {
                return Err(ReturnError::DailyLimitExceeded {
                    actor: request.processed_by.clone(),
                    limit,
                }
                .into());
            }
        }

        // Existence checks outside the transaction; the sale is re-read
        // behind the lock before anything depends on it.
        let sale = self
            .db
            .sales()
            .get_by_id(&request.sale_id)
            .await?
            .ok_or_else(|| ReturnError::SaleNotFound(request.sale_id.clone()))?;
        let store = self.db.stores().require(&sale.store_id).await?;

        let prefix = store_prefix(&store.code);
        let period = period_tag(now);

        let mut tx = self.db.pool().begin().await?;

        // First write: the counter UPSERT serializes concurrent creations.
        // If the counter cannot be bumped, the return still files under a
        // timestamp-derived number rather than being refused.
        let seq = match ReturnRepository::next_sequence(&mut tx, &store.id, &period).await {
            Ok(seq) => seq,
            Err(err) => {
                let fallback = fallback_sequence(now);
                warn!(
                    store_id = %store.id,
                    period = %period,
                    error = %err,
                    fallback_seq = fallback,
                    "Return counter unavailable; issuing timestamp-derived number"
                );
                fallback
            }
        };
        let return_number = format_return_number(&prefix, &period, seq);

        // Everything below sees the post-lock snapshot.
        let sale = SaleRepository::fetch(&mut tx, &request.sale_id)
            .await?
            .ok_or_else(|| ReturnError::SaleNotFound(request.sale_id.clone()))?;
        let lines = SaleRepository::fetch_lines(&mut tx, &request.sale_id).await?;
        let medicines = MedicineRepository::fetch_for_sale(&mut tx, &request.sale_id).await?;
        let returned =
            ReturnRepository::fetch_returned_quantities(&mut tx, &request.sale_id).await?;

        let aggregate = SaleAggregate {
            sale,
            lines,
            medicines,
        };

        let report = check_eligibility(&aggregate, &request.items, &returned, &self.policy, now)?;
        let draft = build_return_draft(&aggregate, &request, report.requires_manager_approval)?;

        if self.policy.below_minimum(draft.total_return_amount_cents) {
            return Err(ReturnError::BelowMinimumAmount {
                amount_cents: draft.total_return_amount_cents,
                minimum_cents: self.policy.minimum_return_amount_cents,
            }
            .into());
        }

        let return_id = generate_return_id();
        let mut header = Return {
            id: return_id.clone(),
            store_id: draft.store_id.clone(),
            sale_id: draft.sale_id.clone(),
            return_number,
            customer_id: draft.customer_id.clone(),
            status: ReturnStatus::Pending,
            subtotal_cents: draft.subtotal_cents,
            tax_adjustment_cents: draft.tax_adjustment_cents,
            discount_adjustment_cents: draft.discount_adjustment_cents,
            total_return_amount_cents: draft.total_return_amount_cents,
            return_reason: draft.return_reason.clone(),
            refund_method: draft.refund_method,
            refund_status: RefundStatus::Pending,
            refund_reference: None,
            refund_processed_at: None,
            restore_inventory: draft.restore_inventory,
            inventory_restoration_status: RestorationStatus::Pending,
            requires_manager_approval: draft.requires_manager_approval,
            processed_by: draft.processed_by.clone(),
            approved_by: None,
            approved_at: None,
            completed_by: None,
            completed_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            notes: draft.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut line_entities: Vec<ReturnLine> = draft
            .lines
            .iter()
            .map(|line| ReturnLine {
                id: generate_return_line_id(),
                return_id: return_id.clone(),
                sale_line_id: line.sale_line_id.clone(),
                medicine_id: line.medicine_id.clone(),
                medicine_name: line.medicine_name.clone(),
                batch_number: line.batch_number.clone(),
                return_quantity: line.return_quantity,
                unit_type: line.unit_type,
                original_quantity: line.original_quantity,
                original_unit_type: line.original_unit_type,
                unit_price_cents: line.unit_price_cents,
                return_amount_cents: line.return_amount_cents,
                restore_to_inventory: line.restore_to_inventory,
                inventory_restored: false,
                inventory_reversed: false,
                restored_at: None,
                restored_by: None,
                restored_containers: 0,
                restored_individual: 0,
                reversed_at: None,
                reversed_by: None,
                reversed_quantity: None,
                reversal_reason: None,
                created_at: now,
            })
            .collect();

        // Stock restoration rides inside the same transaction: if the
        // return rolls back, the shelf adjustments vanish with it.
        if header.restore_inventory {
            let outcome =
                restore_lines(&mut tx, &mut line_entities, &header.processed_by, now).await;
            header.inventory_restoration_status = outcome.header_status();
        } else {
            header.inventory_restoration_status = RestorationStatus::Skipped;
        }

        ReturnRepository::insert_header(&mut tx, &header).await?;
        for line in &line_entities {
            ReturnRepository::insert_line(&mut tx, line).await?;
        }

        // Sale reconciliation: prior accepted history plus this return.
        let mut history = returned;
        history.extend(line_entities.iter().map(|line| ReturnedQuantity {
            sale_line_id: line.sale_line_id.clone(),
            quantity: line.return_quantity,
            unit_type: line.unit_type,
        }));
        if sale_fully_returned(&aggregate, &history)? {
            SaleRepository::mark_returned(&mut tx, &request.sale_id).await?;
            info!(
                invoice = %aggregate.sale.invoice_number,
                "Sale fully consumed by returns"
            );
        }

        tx.commit().await?;

        // Read back what actually landed.
        let header = self.require_persisted(&return_id).await?;
        let lines = self.db.returns().get_lines(&return_id).await?;

        info!(
            return_number = %header.return_number,
            invoice = %report.invoice_number,
            total_cents = header.total_return_amount_cents,
            lines = lines.len(),
            restoration = ?header.inventory_restoration_status,
            "Return created"
        );

        Ok(ReturnAggregate { header, lines })
    }

    /// Post-commit readback. A missing row or an empty number here means
    /// the write did not land the way the transaction claimed.
    async fn require_persisted(&self, return_id: &str) -> EngineResult<Return> {
        let header = self.db.returns().get_by_id(return_id).await?.ok_or_else(|| {
            EngineError::PersistenceFailed(format!("return {return_id} missing after commit"))
        })?;

        if header.return_number.is_empty() {
            return Err(EngineError::PersistenceFailed(format!(
                "return {return_id} committed without a number"
            )));
        }

        Ok(header)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Moves a return through its lifecycle.
    ///
    /// Rejection reverses whatever stock the return had restored; a failed
    /// reversal is logged loudly but never blocks the rejection itself
    /// ([`Self::restore_inventory`] re-drives it). Cancellation releases
    /// the quantity claim and deliberately leaves restored stock in place,
    /// because the goods stayed with the store.
    pub async fn update_status(
        &self,
        return_id: &str,
        request: UpdateReturnStatusRequest,
    ) -> EngineResult<ReturnAggregate> {
        validate_actor(&request.actor)?;

        let current = self.require_return(return_id).await?;
        validate_transition(current.status, request.status)?;

        match request.status {
            ReturnStatus::Approved => {
                self.db
                    .returns()
                    .mark_approved(return_id, &request.actor)
                    .await?;
            }
            ReturnStatus::Processed => {
                self.db
                    .returns()
                    .mark_processed(return_id, request.refund_status)
                    .await?;
            }
            ReturnStatus::Completed => {
                self.db
                    .returns()
                    .mark_completed(return_id, &request.actor, request.refund_status)
                    .await?;
            }
            ReturnStatus::Rejected => {
                let reason = request
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| ValidationError::Required {
                        field: "rejection_reason".to_string(),
                    })?;

                // The status write is the claim: whoever wins it owns the
                // reversal pass, so racing rejections cannot both run it.
                self.db
                    .returns()
                    .mark_rejected(return_id, &request.actor, reason)
                    .await?;
                self.reverse_after_rejection(&current, &request.actor).await;
            }
            ReturnStatus::Cancelled => {
                self.db.returns().mark_cancelled(return_id).await?;
                info!(
                    return_number = %current.return_number,
                    "Return cancelled; restored stock stays on the shelf"
                );
            }
            ReturnStatus::Pending => {
                // No path leads back to pending; validate_transition has
                // already said no, this arm just keeps the match exhaustive.
                return Err(EngineError::InvalidTransition {
                    from: current.status,
                    to: ReturnStatus::Pending,
                });
            }
        }

        info!(
            return_number = %current.return_number,
            from = %current.status,
            to = %request.status,
            actor = %request.actor,
            "Return status updated"
        );

        self.get_return(return_id).await
    }

    /// Runs the post-rejection reversal pass. Failures are logged, never
    /// propagated: the rejection has already happened, and the manual
    /// surface can re-drive the stock work.
    async fn reverse_after_rejection(&self, current: &Return, actor: &str) {
        if !current.restore_inventory {
            return;
        }

        let lines = match self.db.returns().get_lines(&current.id).await {
            Ok(lines) => lines,
            Err(err) => {
                error!(
                    return_number = %current.return_number,
                    error = %err,
                    "Could not load lines for post-rejection reversal"
                );
                return;
            }
        };

        match reverse_restoration(&self.db, current, &lines, actor, REVERSAL_REASON).await {
            Ok(outcome) => {
                if let Err(err) = self
                    .db
                    .returns()
                    .update_restoration_status(&current.id, RestorationStatus::Reversed)
                    .await
                {
                    error!(
                        return_number = %current.return_number,
                        error = %err,
                        "Reversal ran but the header status write failed"
                    );
                }
                info!(
                    return_number = %current.return_number,
                    eligible = outcome.eligible,
                    reversed = outcome.reversed,
                    failed = outcome.failed,
                    "Reversed restored stock after rejection"
                );
            }
            Err(err) => {
                error!(
                    return_number = %current.return_number,
                    error = %err,
                    "Post-rejection reversal failed; restore_inventory can re-drive it"
                );
            }
        }
    }

    // =========================================================================
    // Inventory & Refund Maintenance
    // =========================================================================

    /// Re-drives the inventory side of a return.
    ///
    /// - Active returns: retry restoration for lines that missed out
    /// - Rejected returns: re-attempt the reversal pass
    /// - Cancelled returns: nothing to drive, stock stays where it is
    pub async fn restore_inventory(
        &self,
        return_id: &str,
        actor: &str,
    ) -> EngineResult<ReturnAggregate> {
        validate_actor(actor)?;

        let header = self.require_return(return_id).await?;
        let lines = self.db.returns().get_lines(return_id).await?;

        match header.status {
            ReturnStatus::Rejected => {
                if header.restore_inventory {
                    let outcome =
                        reverse_restoration(&self.db, &header, &lines, actor, REVERSAL_REASON)
                            .await?;
                    self.db
                        .returns()
                        .update_restoration_status(return_id, RestorationStatus::Reversed)
                        .await?;
                    info!(
                        return_number = %header.return_number,
                        eligible = outcome.eligible,
                        reversed = outcome.reversed,
                        failed = outcome.failed,
                        "Re-ran reversal for rejected return"
                    );
                }
            }
            ReturnStatus::Cancelled => {
                info!(
                    return_number = %header.return_number,
                    "Cancelled return keeps restored stock; nothing to do"
                );
            }
            _ => {
                if !header.restore_inventory {
                    info!(
                        return_number = %header.return_number,
                        "Return was filed without restoration; nothing to do"
                    );
                } else {
                    let outcome = retry_restoration(&self.db, &header, &lines, actor).await?;
                    self.db
                        .returns()
                        .update_restoration_status(return_id, outcome.header_status())
                        .await?;

                    info!(
                        return_number = %header.return_number,
                        restorable = outcome.restorable,
                        restored = outcome.restored,
                        failed = outcome.failed(),
                        "Restoration retry finished"
                    );

                    if outcome.restored == 0 {
                        if let Some(medicine) = outcome.failures.first() {
                            return Err(EngineError::InventoryWriteFailed {
                                medicine: medicine.clone(),
                                detail: "restoration retry could not move any stock".to_string(),
                            });
                        }
                    }
                }
            }
        }

        self.get_return(return_id).await
    }

    /// Adjusts refund settlement fields after the fact.
    ///
    /// Unset fields keep their current values. Moving the refund status to
    /// completed stamps `refund_processed_at` exactly once.
    pub async fn update_refund(
        &self,
        return_id: &str,
        request: UpdateRefundRequest,
    ) -> EngineResult<ReturnAggregate> {
        validate_actor(&request.actor)?;

        let current = self.require_return(return_id).await?;

        self.db
            .returns()
            .update_refund(
                return_id,
                request.refund_status,
                request.refund_method,
                request.refund_reference.as_deref(),
            )
            .await?;

        info!(
            return_number = %current.return_number,
            refund_status = ?request.refund_status,
            actor = %request.actor,
            "Refund fields updated"
        );

        self.get_return(return_id).await
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use apotheca_core::policy::HourWindow;
    use apotheca_core::types::{Medicine, RefundMethod, Sale, SaleLine, SaleStatus, Store};
    use apotheca_core::units::UnitType;
    use apotheca_db::DbConfig;
    use chrono::Duration;
    use uuid::Uuid;

    struct Harness {
        db: Database,
        engine: ReturnEngine,
        store_id: String,
        sale_id: String,
        amoxicillin_id: String,
        paracetamol_id: String,
        amoxicillin_line_id: String,
        paracetamol_line_id: String,
    }

    async fn harness() -> Harness {
        harness_with(ReturnPolicy::default(), 3).await
    }

    async fn harness_with(policy: ReturnPolicy, sale_age_days: i64) -> Harness {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        build_harness(db, policy, sale_age_days).await
    }

    /// One store, two medicines, one completed sale:
    /// 10 containers of amoxicillin plus 20 loose paracetamol tablets.
    async fn build_harness(db: Database, policy: ReturnPolicy, sale_age_days: i64) -> Harness {
        let now = Utc::now();
        let store_id = Uuid::new_v4().to_string();
        let sale_id = Uuid::new_v4().to_string();
        let amoxicillin_id = Uuid::new_v4().to_string();
        let paracetamol_id = Uuid::new_v4().to_string();
        let amoxicillin_line_id = Uuid::new_v4().to_string();
        let paracetamol_line_id = Uuid::new_v4().to_string();

        db.stores()
            .insert(&Store {
                id: store_id.clone(),
                name: "Phoenix Pharmacy".into(),
                code: "PHX".into(),
                created_at: now,
            })
            .await
            .unwrap();

        db.medicines()
            .insert(&Medicine {
                id: amoxicillin_id.clone(),
                store_id: store_id.clone(),
                name: "Amoxicillin 500mg".into(),
                generic_name: Some("amoxicillin".into()),
                batch_number: Some("B-77".into()),
                expiry_date: None,
                sell_by_container: true,
                sell_by_individual: true,
                units_per_container: 10,
                container_price_cents: 2000,
                individual_price_cents: Some(200),
                container_stock: 5,
                individual_stock: 20,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        db.medicines()
            .insert(&Medicine {
                id: paracetamol_id.clone(),
                store_id: store_id.clone(),
                name: "Paracetamol 500mg".into(),
                generic_name: Some("paracetamol".into()),
                batch_number: None,
                expiry_date: None,
                sell_by_container: true,
                sell_by_individual: true,
                units_per_container: 10,
                container_price_cents: 1000,
                individual_price_cents: Some(100),
                container_stock: 3,
                individual_stock: 30,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let sale_date = now - Duration::days(sale_age_days);
        db.sales()
            .insert_sale(&Sale {
                id: sale_id.clone(),
                store_id: store_id.clone(),
                customer_id: None,
                invoice_number: "INV-2608-0099".into(),
                status: SaleStatus::Completed,
                is_returned: false,
                subtotal_cents: 22_000,
                total_cents: 22_000,
                sale_date,
                created_at: sale_date,
                updated_at: sale_date,
            })
            .await
            .unwrap();

        db.sales()
            .insert_line(&SaleLine {
                id: amoxicillin_line_id.clone(),
                sale_id: sale_id.clone(),
                medicine_id: amoxicillin_id.clone(),
                medicine_name: "Amoxicillin 500mg".into(),
                batch_number: Some("B-77".into()),
                quantity: 10,
                unit_type: UnitType::Container,
                unit_price_cents: 2000,
                line_total_cents: 20_000,
                created_at: sale_date,
            })
            .await
            .unwrap();

        db.sales()
            .insert_line(&SaleLine {
                id: paracetamol_line_id.clone(),
                sale_id: sale_id.clone(),
                medicine_id: paracetamol_id.clone(),
                medicine_name: "Paracetamol 500mg".into(),
                batch_number: None,
                quantity: 20,
                unit_type: UnitType::Individual,
                unit_price_cents: 100,
                line_total_cents: 2000,
                created_at: sale_date,
            })
            .await
            .unwrap();

        let engine = ReturnEngine::new(db.clone(), policy).unwrap();

        Harness {
            db,
            engine,
            store_id,
            sale_id,
            amoxicillin_id,
            paracetamol_id,
            amoxicillin_line_id,
            paracetamol_line_id,
        }
    }

    fn item(sale_line_id: &str, quantity: i64, unit: UnitType) -> ReturnLineRequest {
        ReturnLineRequest {
            sale_line_id: sale_line_id.into(),
            quantity,
            unit_type: unit,
            restore_to_inventory: true,
        }
    }

    fn request(h: &Harness, items: Vec<ReturnLineRequest>) -> CreateReturnRequest {
        CreateReturnRequest {
            sale_id: h.sale_id.clone(),
            items,
            return_reason: "customer changed their mind".into(),
            refund_method: RefundMethod::Cash,
            restore_inventory: true,
            tax_adjustment_cents: 0,
            discount_adjustment_cents: 0,
            processed_by: "clerk-ayesha".into(),
            customer_id: None,
            notes: None,
        }
    }

    fn status_change(status: ReturnStatus, actor: &str) -> UpdateReturnStatusRequest {
        UpdateReturnStatusRequest {
            status,
            actor: actor.into(),
            rejection_reason: None,
            refund_status: None,
        }
    }

    async fn stock(db: &Database, medicine_id: &str) -> (i64, i64) {
        let med = db.medicines().get_by_id(medicine_id).await.unwrap().unwrap();
        (med.container_stock, med.individual_stock)
    }

    #[tokio::test]
    async fn test_loose_units_return_against_container_line() {
        let h = harness().await;

        // Five loose tablets back off a line sold as whole containers.
        let req = request(&h, vec![item(&h.amoxicillin_line_id, 5, UnitType::Individual)]);
        let agg = h.engine.create_return(req).await.unwrap();

        assert!(agg.header.return_number.starts_with("RET-PHX-"));
        assert_eq!(agg.header.status, ReturnStatus::Pending);
        assert_eq!(agg.header.subtotal_cents, 1000, "5 of 10 tablets at 2000/strip");
        assert_eq!(agg.header.total_return_amount_cents, 1000);
        assert!(!agg.header.requires_manager_approval);
        assert_eq!(
            agg.header.inventory_restoration_status,
            RestorationStatus::Completed
        );

        assert_eq!(agg.lines.len(), 1);
        let line = &agg.lines[0];
        assert!(line.inventory_restored);
        assert_eq!(line.restored_individual, 5);
        assert_eq!(line.restored_containers, 0, "loose units never touch containers");

        // Individual counter moved; container counter did not.
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 25));

        let available = h
            .engine
            .list_available_for_return(&h.sale_id)
            .await
            .unwrap();
        let amox = available
            .iter()
            .find(|a| a.sale_line_id == h.amoxicillin_line_id)
            .unwrap();
        assert_eq!(amox.available_individual, 95);
        assert_eq!(amox.available_containers, 9, "partial strips floor away");
    }

    #[tokio::test]
    async fn test_over_return_across_requests_is_refused() {
        let h = harness().await;

        let first = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        h.engine.create_return(first).await.unwrap();

        let greedy = request(&h, vec![item(&h.amoxicillin_line_id, 10, UnitType::Container)]);
        let err = h.engine.create_return(greedy).await.unwrap_err();

        match &err {
            EngineError::Domain(ReturnError::OverReturnRequested {
                requested,
                available,
                unit,
                ..
            }) => {
                assert_eq!(*requested, 10);
                assert_eq!(*available, 9);
                assert_eq!(*unit, UnitType::Container);
            }
            other => panic!("expected over-return refusal, got {other:?}"),
        }
        assert!(err.is_rejection(), "over-return is the caller's fault");
    }

    #[tokio::test]
    async fn test_return_window_expiry() {
        let h = harness_with(ReturnPolicy::default(), 31).await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let err = h.engine.create_return(req).await.unwrap_err();

        match err {
            EngineError::Domain(ReturnError::ReturnWindowExpired {
                days_elapsed,
                window_days,
            }) => {
                assert_eq!(days_elapsed, 31);
                assert_eq!(window_days, 30);
            }
            other => panic!("expected window expiry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_reverses_restored_stock() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 2, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (7, 20));

        let rejected = h
            .engine
            .update_status(
                &agg.header.id,
                UpdateReturnStatusRequest {
                    status: ReturnStatus::Rejected,
                    actor: "mgr-bilal".into(),
                    rejection_reason: Some("resale condition not met".into()),
                    refund_status: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(rejected.header.status, ReturnStatus::Rejected);
        assert_eq!(rejected.header.rejected_by.as_deref(), Some("mgr-bilal"));
        assert!(rejected.header.rejected_at.is_some());
        assert_eq!(
            rejected.header.rejection_reason.as_deref(),
            Some("resale condition not met")
        );
        assert_eq!(
            rejected.header.inventory_restoration_status,
            RestorationStatus::Reversed
        );

        let line = &rejected.lines[0];
        assert!(line.inventory_reversed);
        assert!(!line.inventory_restored);
        assert_eq!(line.reversed_quantity, Some(2));
        assert_eq!(line.reversed_by.as_deref(), Some("mgr-bilal"));
        assert_eq!(line.reversal_reason.as_deref(), Some("Return rejected"));

        // Shelf back where it started, and the quantity claim is released.
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 20));
        let available = h
            .engine
            .list_available_for_return(&h.sale_id)
            .await
            .unwrap();
        let amox = available
            .iter()
            .find(|a| a.sale_line_id == h.amoxicillin_line_id)
            .unwrap();
        assert_eq!(amox.available_containers, 10);
    }

    #[tokio::test]
    async fn test_reversal_clamps_to_stock_on_hand() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 2, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (7, 20));

        // Everything sells out before the rejection lands.
        let mut conn = h.db.pool().acquire().await.unwrap();
        let sold =
            MedicineRepository::deduct_clamped(&mut conn, &h.amoxicillin_id, UnitType::Container, 7)
                .await
                .unwrap();
        assert_eq!(sold, 7);
        drop(conn);

        let rejected = h
            .engine
            .update_status(
                &agg.header.id,
                UpdateReturnStatusRequest {
                    status: ReturnStatus::Rejected,
                    actor: "mgr-bilal".into(),
                    rejection_reason: Some("damaged packaging on inspection".into()),
                    refund_status: None,
                },
            )
            .await
            .unwrap();

        // Stock never goes negative; the shortfall lands on the audit trail.
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (0, 20));
        assert_eq!(rejected.lines[0].reversed_quantity, Some(0));
        assert!(rejected.lines[0].inventory_reversed);
        assert_eq!(
            rejected.header.inventory_restoration_status,
            RestorationStatus::Reversed
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_one_wins() {
        // In-memory SQLite is capped at one connection, so genuine
        // concurrency needs a throwaway file-backed database.
        let path = std::env::temp_dir().join(format!("apotheca-race-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let h = build_harness(db, ReturnPolicy::default(), 3).await;

        // Ten containers sold; two clerks each try to return six.
        let a = request(&h, vec![item(&h.amoxicillin_line_id, 6, UnitType::Container)]);
        let b = request(&h, vec![item(&h.amoxicillin_line_id, 6, UnitType::Container)]);

        let engine_a = h.engine.clone();
        let engine_b = h.engine.clone();
        let (ra, rb) = tokio::join!(engine_a.create_return(a), engine_b.create_return(b));

        let (winner, loser) = match (ra, rb) {
            (Ok(agg), Err(err)) | (Err(err), Ok(agg)) => (agg, err),
            (Ok(_), Ok(_)) => panic!("both returns accepted; 12 of 10 containers came back"),
            (Err(ea), Err(eb)) => panic!("both returns refused: {ea:?} / {eb:?}"),
        };

        assert!(winner.header.return_number.ends_with("-0001"));
        assert!(matches!(
            loser,
            EngineError::Domain(ReturnError::OverReturnRequested { .. })
        ));

        // Only the winner moved stock.
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (11, 20));

        h.db.close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_sequential_numbers_increment() {
        let h = harness().await;

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
            numbers.push(h.engine.create_return(req).await.unwrap().header.return_number);
        }

        assert!(numbers[0].ends_with("-0001"));
        assert!(numbers[1].ends_with("-0002"));
        assert!(numbers[2].ends_with("-0003"));
        for number in &numbers {
            assert!(number.starts_with("RET-PHX-"));
        }
    }

    #[tokio::test]
    async fn test_restoration_skipped_when_disabled() {
        let h = harness().await;

        let mut req = request(&h, vec![item(&h.amoxicillin_line_id, 2, UnitType::Container)]);
        req.restore_inventory = false;
        let agg = h.engine.create_return(req).await.unwrap();

        assert_eq!(
            agg.header.inventory_restoration_status,
            RestorationStatus::Skipped
        );
        assert!(!agg.lines[0].restore_to_inventory);
        assert!(!agg.lines[0].inventory_restored);
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 20));

        // The manual pass respects the filed-without-restoration choice.
        let after = h
            .engine
            .restore_inventory(&agg.header.id, "mgr-bilal")
            .await
            .unwrap();
        assert_eq!(
            after.header.inventory_restoration_status,
            RestorationStatus::Skipped
        );
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 20));
    }

    #[tokio::test]
    async fn test_manual_restore_is_idempotent() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.paracetamol_line_id, 5, UnitType::Individual)]);
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(stock(&h.db, &h.paracetamol_id).await, (3, 35));

        // Running the retry twice moves nothing twice.
        for _ in 0..2 {
            let after = h
                .engine
                .restore_inventory(&agg.header.id, "mgr-bilal")
                .await
                .unwrap();
            assert_eq!(
                after.header.inventory_restoration_status,
                RestorationStatus::Completed
            );
            assert_eq!(after.lines[0].restored_individual, 5);
            assert_eq!(stock(&h.db, &h.paracetamol_id).await, (3, 35));
        }
    }

    #[tokio::test]
    async fn test_rejection_requires_a_reason() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();

        for reason in [None, Some("   ".to_string())] {
            let err = h
                .engine
                .update_status(
                    &agg.header.id,
                    UpdateReturnStatusRequest {
                        status: ReturnStatus::Rejected,
                        actor: "mgr-bilal".into(),
                        rejection_reason: reason,
                        refund_status: None,
                    },
                )
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                EngineError::Domain(ReturnError::Validation(ValidationError::Required {
                    ref field
                })) if field == "rejection_reason"
            ));
        }

        // Still pending, stock still restored.
        let unchanged = h.engine.get_return(&agg.header.id).await.unwrap();
        assert_eq!(unchanged.header.status, ReturnStatus::Pending);
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (6, 20));
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_enforced() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();
        let id = agg.header.id.clone();

        let approved = h
            .engine
            .update_status(&id, status_change(ReturnStatus::Approved, "mgr-bilal"))
            .await
            .unwrap();
        assert_eq!(approved.header.status, ReturnStatus::Approved);
        assert_eq!(approved.header.approved_by.as_deref(), Some("mgr-bilal"));
        assert!(approved.header.approved_at.is_some());

        // Completion straight from approved, carrying the refund along.
        let completed = h
            .engine
            .update_status(
                &id,
                UpdateReturnStatusRequest {
                    status: ReturnStatus::Completed,
                    actor: "clerk-ayesha".into(),
                    rejection_reason: None,
                    refund_status: Some(RefundStatus::Completed),
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.header.status, ReturnStatus::Completed);
        assert_eq!(completed.header.completed_by.as_deref(), Some("clerk-ayesha"));
        assert!(completed.header.completed_at.is_some());
        assert_eq!(completed.header.refund_status, RefundStatus::Completed);
        assert!(completed.header.refund_processed_at.is_some());

        // Terminal means terminal.
        let err = h
            .engine
            .update_status(&id, status_change(ReturnStatus::Approved, "mgr-bilal"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: ReturnStatus::Completed,
                to: ReturnStatus::Approved,
            }
        ));

        // An approved return can no longer be cancelled.
        let second = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let second = h.engine.create_return(second).await.unwrap();
        h.engine
            .update_status(&second.header.id, status_change(ReturnStatus::Approved, "mgr-bilal"))
            .await
            .unwrap();
        let err = h
            .engine
            .update_status(
                &second.header.id,
                status_change(ReturnStatus::Cancelled, "clerk-ayesha"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: ReturnStatus::Approved,
                to: ReturnStatus::Cancelled,
            }
        ));

        // Blank actors never get to move anything.
        let err = h
            .engine
            .update_status(&id, status_change(ReturnStatus::Completed, "  "))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(ReturnError::Validation(ValidationError::Required { ref field }))
                if field == "actor"
        ));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_restored_stock() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 2, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (7, 20));

        let cancelled = h
            .engine
            .update_status(
                &agg.header.id,
                status_change(ReturnStatus::Cancelled, "clerk-ayesha"),
            )
            .await
            .unwrap();

        assert_eq!(cancelled.header.status, ReturnStatus::Cancelled);
        // No reversal on cancellation: the goods stayed with the store.
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (7, 20));
        assert_eq!(
            cancelled.header.inventory_restoration_status,
            RestorationStatus::Completed
        );
        assert!(cancelled.lines[0].inventory_restored);

        // But the quantity claim is released for future returns.
        let available = h
            .engine
            .list_available_for_return(&h.sale_id)
            .await
            .unwrap();
        let amox = available
            .iter()
            .find(|a| a.sale_line_id == h.amoxicillin_line_id)
            .unwrap();
        assert_eq!(amox.available_containers, 10);
    }

    #[tokio::test]
    async fn test_daily_cap_counts_per_actor() {
        let policy = ReturnPolicy {
            max_returns_per_actor_per_day: 2,
            ..Default::default()
        };
        let h = harness_with(policy, 3).await;

        for _ in 0..2 {
            let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
            h.engine.create_return(req).await.unwrap();
        }

        let third = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let err = h.engine.create_return(third).await.unwrap_err();
        match err {
            EngineError::Domain(ReturnError::DailyLimitExceeded { ref actor, limit }) => {
                assert_eq!(actor, "clerk-ayesha");
                assert_eq!(limit, 2);
            }
            other => panic!("expected daily limit refusal, got {other:?}"),
        }

        // The cap is per actor, not per store.
        let mut other_clerk = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        other_clerk.processed_by = "clerk-omar".into();
        h.engine.create_return(other_clerk).await.unwrap();
    }

    #[tokio::test]
    async fn test_minimum_amount_gate_rolls_back_number() {
        let policy = ReturnPolicy {
            minimum_return_amount_cents: 1500,
            ..Default::default()
        };
        let h = harness_with(policy, 3).await;

        // 5 loose paracetamol at 100 = 500, under the 1500 floor.
        let small = request(&h, vec![item(&h.paracetamol_line_id, 5, UnitType::Individual)]);
        let err = h.engine.create_return(small).await.unwrap_err();
        match err {
            EngineError::Domain(ReturnError::BelowMinimumAmount {
                amount_cents,
                minimum_cents,
            }) => {
                assert_eq!(amount_cents, 500);
                assert_eq!(minimum_cents, 1500);
            }
            other => panic!("expected minimum-amount refusal, got {other:?}"),
        }
        assert_eq!(stock(&h.db, &h.paracetamol_id).await, (3, 30), "nothing moved");

        // The refused attempt's counter bump rolled back with it.
        let big = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(big).await.unwrap();
        assert!(agg.header.return_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_outside_allowed_hours_is_refused() {
        let now_hour = Utc::now().hour() as u8;
        let start = (now_hour + 12) % 24;
        let end = (now_hour + 13) % 24;

        let policy = ReturnPolicy {
            allowed_hours: Some(HourWindow {
                start_hour: start,
                end_hour: end,
            }),
            ..Default::default()
        };
        let h = harness_with(policy, 3).await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let err = h.engine.create_return(req).await.unwrap_err();
        match err {
            EngineError::Domain(ReturnError::OutsideAllowedHours {
                start_hour,
                end_hour,
                ..
            }) => {
                assert_eq!(start_hour, start);
                assert_eq!(end_hour, end);
            }
            other => panic!("expected hour-window refusal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_consumption_flips_sale() {
        let h = harness().await;

        let req = request(
            &h,
            vec![
                item(&h.amoxicillin_line_id, 10, UnitType::Container),
                item(&h.paracetamol_line_id, 20, UnitType::Individual),
            ],
        );
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(agg.header.total_return_amount_cents, 22_000);
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (15, 20));
        assert_eq!(stock(&h.db, &h.paracetamol_id).await, (3, 50));

        let sale = h.db.sales().get_by_id(&h.sale_id).await.unwrap().unwrap();
        assert!(sale.is_returned);
        assert_eq!(sale.status, SaleStatus::Returned);

        let again = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let err = h.engine.create_return(again).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(ReturnError::AlreadyFullyReturned { ref invoice })
                if invoice == "INV-2608-0099"
        ));
    }

    #[tokio::test]
    async fn test_partial_tablets_can_close_sale_by_rounding_up() {
        let h = harness().await;

        // 95 of 100 tablets still consume all ten strips in the sold frame.
        let req = request(
            &h,
            vec![
                item(&h.amoxicillin_line_id, 95, UnitType::Individual),
                item(&h.paracetamol_line_id, 20, UnitType::Individual),
            ],
        );
        h.engine.create_return(req).await.unwrap();

        let sale = h.db.sales().get_by_id(&h.sale_id).await.unwrap().unwrap();
        assert!(sale.is_returned, "rounding up closes the sale early");
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 115));
    }

    #[tokio::test]
    async fn test_validate_eligibility_files_nothing() {
        let h = harness().await;

        let items = vec![item(&h.amoxicillin_line_id, 2, UnitType::Container)];
        let outcome = h
            .engine
            .validate_eligibility(&h.sale_id, &items)
            .await
            .unwrap();

        assert_eq!(outcome.report.invoice_number, "INV-2608-0099");
        assert_eq!(outcome.report.days_elapsed, 3);
        assert!(!outcome.report.requires_manager_approval);
        assert_eq!(outcome.report.lines[0].available, 10);
        assert_eq!(outcome.sale.lines.len(), 2);

        // Checking is free: nothing was written, nothing restocked.
        let listed = h
            .engine
            .list_returns(&h.store_id, ReturnFilters::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(stock(&h.db, &h.amoxicillin_id).await, (5, 20));

        // Past the approval threshold the flag comes back set, and a
        // created return carries it.
        let old = harness_with(ReturnPolicy::default(), 10).await;
        let outcome = old
            .engine
            .validate_eligibility(&old.sale_id, &[item(&old.amoxicillin_line_id, 1, UnitType::Container)])
            .await
            .unwrap();
        assert!(outcome.report.requires_manager_approval);

        let req = request(&old, vec![item(&old.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = old.engine.create_return(req).await.unwrap();
        assert!(agg.header.requires_manager_approval);
    }

    #[tokio::test]
    async fn test_expired_medicine_warns_but_is_accepted() {
        let h = harness().await;

        let yesterday = Utc::now().date_naive() - Duration::days(1);
        sqlx::query("UPDATE medicines SET expiry_date = ?1 WHERE id = ?2")
            .bind(yesterday)
            .bind(&h.amoxicillin_id)
            .execute(h.db.pool())
            .await
            .unwrap();

        let items = vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)];
        let outcome = h
            .engine
            .validate_eligibility(&h.sale_id, &items)
            .await
            .unwrap();
        assert!(
            outcome.report.warnings.iter().any(|w| w.contains("quarantine")),
            "expired stock warns: {:?}",
            outcome.report.warnings
        );

        // Warned, not refused.
        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();
        assert_eq!(agg.header.status, ReturnStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_refund_adjusts_settlement() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();

        let updated = h
            .engine
            .update_refund(
                &agg.header.id,
                UpdateRefundRequest {
                    refund_status: Some(RefundStatus::Processed),
                    refund_method: Some(RefundMethod::BankTransfer),
                    refund_reference: Some("TXN-2608-40".into()),
                    actor: "clerk-ayesha".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.header.refund_status, RefundStatus::Processed);
        assert_eq!(updated.header.refund_method, RefundMethod::BankTransfer);
        assert_eq!(updated.header.refund_reference.as_deref(), Some("TXN-2608-40"));
        assert!(updated.header.refund_processed_at.is_none());

        // Unset fields keep their values; completion stamps the clock.
        let settled = h
            .engine
            .update_refund(
                &agg.header.id,
                UpdateRefundRequest {
                    refund_status: Some(RefundStatus::Completed),
                    refund_method: None,
                    refund_reference: None,
                    actor: "clerk-ayesha".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(settled.header.refund_status, RefundStatus::Completed);
        assert_eq!(settled.header.refund_method, RefundMethod::BankTransfer);
        assert!(settled.header.refund_processed_at.is_some());

        let err = h
            .engine
            .update_refund(
                &agg.header.id,
                UpdateRefundRequest {
                    refund_status: None,
                    refund_method: None,
                    refund_reference: None,
                    actor: "".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));
    }

    #[tokio::test]
    async fn test_get_return_round_trips() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        let agg = h.engine.create_return(req).await.unwrap();

        let by_id = h.engine.get_return(&agg.header.id).await.unwrap();
        assert_eq!(by_id.header.return_number, agg.header.return_number);
        assert_eq!(by_id.lines.len(), 1);

        let by_number = h
            .engine
            .get_return_by_number(&agg.header.return_number)
            .await
            .unwrap();
        assert_eq!(by_number.header.id, agg.header.id);

        let missing = Uuid::new_v4().to_string();
        let err = h.engine.get_return(&missing).await.unwrap_err();
        assert!(matches!(err, EngineError::Db(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_returns_is_scoped_to_store() {
        let h = harness().await;

        let req = request(&h, vec![item(&h.amoxicillin_line_id, 1, UnitType::Container)]);
        h.engine.create_return(req).await.unwrap();

        let listed = h
            .engine
            .list_returns(&h.store_id, ReturnFilters::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        // A filter smuggling another store's id is overridden.
        let smuggled = ReturnFilters {
            store_id: Some(h.store_id.clone()),
            ..Default::default()
        };
        let other_store = h
            .engine
            .list_returns(&Uuid::new_v4().to_string(), smuggled)
            .await
            .unwrap();
        assert!(other_store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_policy_is_refused_at_construction() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let policy = ReturnPolicy {
            return_window_days: 0,
            ..Default::default()
        };
        let err = ReturnEngine::new(db, policy).unwrap_err();

        assert!(matches!(err, EngineError::Policy(_)));
        assert!(err.is_config_error());
        assert!(!err.is_rejection());
    }
}
