//! # Return Status Lifecycle
//!
//! The legal status transitions, in one place. Repository stamps enforce
//! the same rules with `WHERE status = ...` guards; this module is the
//! front door that rejects an illegal move before any SQL runs, with an
//! error that names both ends of the attempted step.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Return Status Lifecycle                          │
//! │                                                                         │
//! │             ┌──► approved ──┬──► processed ──┐                          │
//! │             │               │                │                          │
//! │  pending ───┼──► rejected   └────────┬───────┘                          │
//! │             │                        ▼                                  │
//! │             └──► cancelled       completed                              │
//! │                                                                         │
//! │  completed, rejected, and cancelled are terminal.                       │
//! │  Rejection reverses restored stock; cancellation leaves it in place.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use apotheca_core::types::ReturnStatus;

use crate::error::{EngineError, EngineResult};

/// The statuses a return may move to from `from`.
pub fn allowed_transitions(from: ReturnStatus) -> &'static [ReturnStatus] {
    match from {
        ReturnStatus::Pending => &[
            ReturnStatus::Approved,
            ReturnStatus::Rejected,
            ReturnStatus::Cancelled,
        ],
        ReturnStatus::Approved => &[ReturnStatus::Processed, ReturnStatus::Completed],
        ReturnStatus::Processed => &[ReturnStatus::Completed],
        ReturnStatus::Completed | ReturnStatus::Rejected | ReturnStatus::Cancelled => &[],
    }
}

/// Whether `from → to` is a legal lifecycle step.
pub fn can_transition(from: ReturnStatus, to: ReturnStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Rejects an illegal lifecycle step with both ends named.
pub fn validate_transition(from: ReturnStatus, to: ReturnStatus) -> EngineResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_branches_three_ways() {
        assert!(can_transition(ReturnStatus::Pending, ReturnStatus::Approved));
        assert!(can_transition(ReturnStatus::Pending, ReturnStatus::Rejected));
        assert!(can_transition(ReturnStatus::Pending, ReturnStatus::Cancelled));

        assert!(!can_transition(ReturnStatus::Pending, ReturnStatus::Processed));
        assert!(!can_transition(ReturnStatus::Pending, ReturnStatus::Completed));
        assert!(!can_transition(ReturnStatus::Pending, ReturnStatus::Pending));
    }

    #[test]
    fn test_approved_can_skip_processed() {
        assert!(can_transition(ReturnStatus::Approved, ReturnStatus::Processed));
        assert!(can_transition(ReturnStatus::Approved, ReturnStatus::Completed));

        assert!(!can_transition(ReturnStatus::Approved, ReturnStatus::Rejected));
        assert!(!can_transition(ReturnStatus::Approved, ReturnStatus::Cancelled));
    }

    #[test]
    fn test_processed_only_completes() {
        assert_eq!(
            allowed_transitions(ReturnStatus::Processed),
            &[ReturnStatus::Completed]
        );
    }

    #[test]
    fn test_terminal_statuses_allow_nothing() {
        for terminal in [
            ReturnStatus::Completed,
            ReturnStatus::Rejected,
            ReturnStatus::Cancelled,
        ] {
            assert!(allowed_transitions(terminal).is_empty(), "{terminal} is terminal");
        }
    }

    #[test]
    fn test_validate_names_both_ends() {
        let err = validate_transition(ReturnStatus::Rejected, ReturnStatus::Approved).unwrap_err();
        match err {
            EngineError::InvalidTransition { from, to } => {
                assert_eq!(from, ReturnStatus::Rejected);
                assert_eq!(to, ReturnStatus::Approved);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }
}
