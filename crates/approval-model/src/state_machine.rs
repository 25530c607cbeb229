//! Transition tables
//!
//! Batch: `open -> completed`, nothing leaves `completed`.
//!
//! Item: `pending -> approved | rejected` and `approved <-> rejected`.
//! Re-applying the current decision is listed as allowed so that a retried
//! request succeeds. Nothing ever moves back to `pending`.
//!
//! Whether the owning batch still accepts item changes is not part of the
//! item table; the engine checks the batch status separately.

use crate::error::ValidationError;
use crate::status::{BatchStatus, ItemStatus};

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_item_transitions(from: ItemStatus) -> Vec<ItemStatus> {
    match from {
        ItemStatus::Pending | ItemStatus::Approved | ItemStatus::Rejected => {
            vec![ItemStatus::Approved, ItemStatus::Rejected]
        }
    }
}

/// Validates an item transition.
///
/// A `pending` target is reported as [`ValidationError::PendingTarget`]
/// regardless of the current state.
pub fn validate_item_transition(from: ItemStatus, to: ItemStatus) -> Result<(), ValidationError> {
    if to == ItemStatus::Pending {
        return Err(ValidationError::PendingTarget);
    }
    if allowed_item_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ValidationError::IllegalTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_batch_transitions(from: BatchStatus) -> Vec<BatchStatus> {
    match from {
        BatchStatus::Open => vec![BatchStatus::Completed],
        BatchStatus::Completed => vec![],
    }
}

/// Validates a batch transition
pub fn validate_batch_transition(from: BatchStatus, to: BatchStatus) -> Result<(), ValidationError> {
    if allowed_batch_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ValidationError::IllegalTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}
