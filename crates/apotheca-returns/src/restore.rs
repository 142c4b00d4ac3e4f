//! # Stock Restoration & Reversal
//!
//! Moves returned goods back onto the shelf, and pulls them off again when
//! a return is rejected after the fact.
//!
//! ## Three Passes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Restoration & Reversal Passes                        │
//! │                                                                         │
//! │  Creation (inside the creation txn)                                     │
//! │    restock() per restorable line; outcomes ride into insert_line()      │
//! │                                                                         │
//! │  Manual retry (one short txn per line)                                  │
//! │    fetch_line ─► mark_line_restored claim ─► restock ─► COMMIT          │
//! │                      │                          │                       │
//! │                      └─ already done: skip      └─ fail: ROLLBACK       │
//! │                                                                         │
//! │  Reversal on rejection (one short txn per line)                         │
//! │    fetch_line ─► deduct_clamped ─► mark_line_reversed claim ─► COMMIT   │
//! │                                                                         │
//! │  The line flags are the ledger. Claims are guarded UPDATEs, and a       │
//! │  failed step rolls the whole line back, so flag and shelf agree         │
//! │  whenever a transaction is not mid-flight.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock always moves in the unit the customer handed back: a container
//! return bumps `container_stock`, a loose-unit return bumps
//! `individual_stock`. No cross-unit conversion happens here.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{error, info, warn};

use apotheca_core::types::{RestorationStatus, Return, ReturnLine};
use apotheca_core::units::UnitType;
use apotheca_db::{Database, MedicineRepository, ReturnRepository};

use crate::error::EngineResult;

// =============================================================================
// Outcomes
// =============================================================================

/// Tally of one restoration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorationOutcome {
    /// Lines flagged for restoration.
    pub restorable: usize,
    /// Lines whose stock is on the shelf after this pass, counting lines
    /// an earlier pass already handled.
    pub restored: usize,
    /// Medicine names whose stock write failed this pass.
    pub failures: Vec<String>,
}

impl RestorationOutcome {
    /// Lines whose stock write failed this pass.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Header-level status summarizing this pass.
    ///
    /// No failures means every restorable line is accounted for, which is
    /// also the right answer when nothing was restorable at all.
    pub fn header_status(&self) -> RestorationStatus {
        if self.failures.is_empty() {
            RestorationStatus::Completed
        } else if self.restored > 0 {
            RestorationStatus::Partial
        } else {
            RestorationStatus::Failed
        }
    }
}

/// Tally of one reversal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReversalOutcome {
    /// Lines found restored and not yet reversed.
    pub eligible: usize,
    /// Lines whose stock came back off the shelf this pass.
    pub reversed: usize,
    /// Lines whose deduction failed this pass.
    pub failed: usize,
}

/// Splits a line's quantity into the (containers, individual) pair the
/// line records, keyed by the unit the return was requested in.
fn restored_split(line: &ReturnLine) -> (i64, i64) {
    match line.unit_type {
        UnitType::Container => (line.return_quantity, 0),
        UnitType::Individual => (0, line.return_quantity),
    }
}

// =============================================================================
// Creation-Time Pass
// =============================================================================

/// Restoration pass run inside the creation transaction.
///
/// Attempts a shelf write for every line flagged for restoration and
/// records the outcome on the line entities themselves; the lines are
/// inserted afterwards already carrying their final flags. A failed write
/// is logged and counted, never fatal: the return still files, and the
/// manual retry surface picks the line up later.
pub async fn restore_lines(
    conn: &mut SqliteConnection,
    lines: &mut [ReturnLine],
    actor: &str,
    now: DateTime<Utc>,
) -> RestorationOutcome {
    let mut outcome = RestorationOutcome::default();

    for line in lines.iter_mut().filter(|l| l.restore_to_inventory) {
        outcome.restorable += 1;

        let written = MedicineRepository::restock(
            &mut *conn,
            &line.medicine_id,
            line.unit_type,
            line.return_quantity,
        )
        .await;

        match written {
            Ok(()) => {
                let (containers, individual) = restored_split(line);
                line.inventory_restored = true;
                line.restored_at = Some(now);
                line.restored_by = Some(actor.to_string());
                line.restored_containers = containers;
                line.restored_individual = individual;
                outcome.restored += 1;
            }
            Err(err) => {
                warn!(
                    medicine_id = %line.medicine_id,
                    medicine = %line.medicine_name,
                    error = %err,
                    "Stock restoration failed; line left for manual retry"
                );
                outcome.failures.push(line.medicine_name.clone());
            }
        }
    }

    outcome
}

// =============================================================================
// Manual Retry Pass
// =============================================================================

/// Re-attempts restoration for lines that missed out at creation.
///
/// Each line gets its own short transaction: re-read, claim, restock,
/// commit. The claim is a guarded UPDATE, so concurrent retries cannot
/// double-stock, and a failed restock rolls the claim back with it.
pub async fn retry_restoration(
    db: &Database,
    ret: &Return,
    lines: &[ReturnLine],
    actor: &str,
) -> EngineResult<RestorationOutcome> {
    let mut outcome = RestorationOutcome::default();

    for line in lines.iter().filter(|l| l.restore_to_inventory) {
        outcome.restorable += 1;

        let mut tx = db.pool().begin().await?;

        let fresh = match ReturnRepository::fetch_line(&mut tx, &line.id).await? {
            Some(fresh) => fresh,
            None => {
                warn!(line_id = %line.id, "Return line vanished during restoration retry");
                outcome.failures.push(line.medicine_name.clone());
                continue;
            }
        };

        if fresh.inventory_restored {
            outcome.restored += 1;
            continue;
        }
        if fresh.inventory_reversed {
            // Reversed lines stay reversed.
            continue;
        }

        let (containers, individual) = restored_split(&fresh);
        let claimed =
            ReturnRepository::mark_line_restored(&mut tx, &fresh.id, actor, containers, individual)
                .await?;

        if !claimed {
            // Another pass got there between the read and the claim.
            outcome.restored += 1;
            continue;
        }

        let written = MedicineRepository::restock(
            &mut tx,
            &fresh.medicine_id,
            fresh.unit_type,
            fresh.return_quantity,
        )
        .await;

        match written {
            Ok(()) => {
                tx.commit().await?;
                outcome.restored += 1;
                info!(
                    return_number = %ret.return_number,
                    line_id = %fresh.id,
                    medicine = %fresh.medicine_name,
                    "Restored stock on retry"
                );
            }
            Err(err) => {
                tx.rollback().await?;
                outcome.failures.push(fresh.medicine_name.clone());
                warn!(
                    return_number = %ret.return_number,
                    line_id = %fresh.id,
                    medicine = %fresh.medicine_name,
                    error = %err,
                    "Retry restoration failed"
                );
            }
        }
    }

    Ok(outcome)
}

// =============================================================================
// Reversal Pass
// =============================================================================

/// Pulls restored stock back off the shelf after a rejection.
///
/// Deductions clamp at zero: stock resold between restoration and
/// rejection cannot be clawed back, and the line records how much actually
/// moved. One short transaction per line; the caller decides whether a
/// failure blocks anything (rejection never lets it).
pub async fn reverse_restoration(
    db: &Database,
    ret: &Return,
    lines: &[ReturnLine],
    actor: &str,
    reason: &str,
) -> EngineResult<ReversalOutcome> {
    let mut outcome = ReversalOutcome::default();

    for line in lines.iter().filter(|l| l.restore_to_inventory) {
        let mut tx = db.pool().begin().await?;

        let fresh = match ReturnRepository::fetch_line(&mut tx, &line.id).await? {
            Some(fresh) => fresh,
            None => {
                warn!(line_id = %line.id, "Return line vanished during reversal");
                continue;
            }
        };

        if fresh.inventory_reversed || !fresh.inventory_restored {
            continue;
        }
        outcome.eligible += 1;

        let restored_qty = match fresh.unit_type {
            UnitType::Container => fresh.restored_containers,
            UnitType::Individual => fresh.restored_individual,
        };

        let deducted = MedicineRepository::deduct_clamped(
            &mut tx,
            &fresh.medicine_id,
            fresh.unit_type,
            restored_qty,
        )
        .await;

        match deducted {
            Ok(actual) => {
                let claimed =
                    ReturnRepository::mark_line_reversed(&mut tx, &fresh.id, actor, actual, reason)
                        .await?;

                if !claimed {
                    tx.rollback().await?;
                    continue;
                }

                tx.commit().await?;
                outcome.reversed += 1;

                if actual < restored_qty {
                    warn!(
                        return_number = %ret.return_number,
                        line_id = %fresh.id,
                        medicine = %fresh.medicine_name,
                        restored = restored_qty,
                        recovered = actual,
                        "Partial reversal: some restored stock was already resold"
                    );
                }
            }
            Err(err) => {
                tx.rollback().await?;
                outcome.failed += 1;
                error!(
                    return_number = %ret.return_number,
                    line_id = %fresh.id,
                    medicine = %fresh.medicine_name,
                    error = %err,
                    "Stock reversal failed; shelf count needs manual correction"
                );
            }
        }
    }

    Ok(outcome)
}
