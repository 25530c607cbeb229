//! Error types for the approval engine
//!
//! Every operation returns either the updated entity or an
//! [`ApprovalError`]. The four caller-facing classes are exposed through
//! [`ApprovalError::kind`]:
//! - not found (token, batch, item or client)
//! - batch locked (mutation against a completed batch)
//! - persistence failure (store fault; finalize halts and asks for a retry)
//! - validation failure (malformed input, no partial effect)

use approval_model::{BatchId, ClientId, ItemId, ValidationError};
use approval_store::StoreError;
use std::fmt;

/// What could not be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// No batch owns the presented link token
    Link,
    /// Batch id unknown
    Batch(BatchId),
    /// Item id unknown, or not part of the addressed batch
    Item(ItemId),
    /// Client id unknown
    Client(ClientId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Link => write!(f, "link"),
            Missing::Batch(id) => write!(f, "batch {id}"),
            Missing::Item(id) => write!(f, "item {id}"),
            Missing::Client(id) => write!(f, "client {id}"),
        }
    }
}

/// Where a finalize call stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStage {
    /// Reading the batch row failed; nothing was written
    LoadBatch,
    /// Loading the item list failed; nothing was written
    LoadItems,
    /// An item write failed after `committed` of `total` succeeded
    ItemSweep {
        /// Items whose annotations were written in this call
        committed: usize,
        /// Items in the batch
        total: usize,
    },
    /// Every item was written but the batch could not be closed
    CloseBatch,
}

impl fmt::Display for FinalizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeStage::LoadBatch => write!(f, "batch load"),
            FinalizeStage::LoadItems => write!(f, "item load"),
            FinalizeStage::ItemSweep { committed, total } => {
                write!(f, "item sweep ({committed}/{total} written)")
            }
            FinalizeStage::CloseBatch => write!(f, "batch close"),
        }
    }
}

/// Caller-facing error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Token, batch, item or client does not exist
    NotFound,
    /// Batch already completed
    BatchLocked,
    /// Store read or write failed
    PersistenceFailure,
    /// Input rejected
    ValidationFailure,
}

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(Missing),

    /// Mutation attempted on a completed batch
    #[error("batch {0} is already finalized")]
    BatchLocked(BatchId),

    /// Store failure outside finalize
    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),

    /// Input rejected before any write
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Finalize stopped part way; the batch is still open
    #[error("finalize incomplete for batch {batch_id} at {stage}, retry: {source}")]
    FinalizeIncomplete {
        /// Batch being finalized
        batch_id: BatchId,
        /// Step that failed
        stage: FinalizeStage,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },
}

impl ApprovalError {
    /// Caller-facing class of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BatchLocked(_) => ErrorKind::BatchLocked,
            Self::Persistence(_) | Self::FinalizeIncomplete { .. } => ErrorKind::PersistenceFailure,
            Self::Validation(_) => ErrorKind::ValidationFailure,
        }
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(err) => err.is_transient(),
            Self::FinalizeIncomplete { .. } => true,
            _ => false,
        }
    }

    /// Check if the batch is finalized
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::BatchLocked(_))
    }

    /// Check if the referenced entity is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for ApprovalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BatchClosed(batch_id) => Self::BatchLocked(batch_id),
            other => Self::Persistence(other),
        }
    }
}

/// Result alias for engine operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_follow_taxonomy() {
        assert_eq!(ApprovalError::NotFound(Missing::Link).kind(), ErrorKind::NotFound);
        assert_eq!(
            ApprovalError::BatchLocked(BatchId::new()).kind(),
            ErrorKind::BatchLocked
        );
        assert_eq!(
            ApprovalError::Validation(ValidationError::PendingTarget).kind(),
            ErrorKind::ValidationFailure
        );
        let incomplete = ApprovalError::FinalizeIncomplete {
            batch_id: BatchId::new(),
            stage: FinalizeStage::CloseBatch,
            source: StoreError::unavailable("complete_batch", "timeout"),
        };
        assert_eq!(incomplete.kind(), ErrorKind::PersistenceFailure);
    }

    #[test]
    fn retryable_errors() {
        assert!(ApprovalError::from(StoreError::unavailable("put_item", "reset")).is_retryable());
        assert!(!ApprovalError::from(StoreError::DuplicateKey("x".to_string())).is_retryable());
        assert!(!ApprovalError::BatchLocked(BatchId::new()).is_retryable());
        assert!(!ApprovalError::NotFound(Missing::Link).is_retryable());
    }

    #[test]
    fn closed_batch_store_error_is_locked() {
        let batch_id = BatchId::new();
        let err = ApprovalError::from(StoreError::BatchClosed(batch_id));
        assert!(matches!(err, ApprovalError::BatchLocked(id) if id == batch_id));
        assert_eq!(err.kind(), ErrorKind::BatchLocked);
    }

    #[test]
    fn finalize_incomplete_display_names_stage() {
        let err = ApprovalError::FinalizeIncomplete {
            batch_id: BatchId::new(),
            stage: FinalizeStage::ItemSweep { committed: 1, total: 2 },
            source: StoreError::unavailable("write_annotations", "injected fault"),
        };
        let text = err.to_string();
        assert!(text.contains("item sweep (1/2 written)"));
        assert!(text.contains("retry"));
    }
}
