//! Store errors

use approval_model::BatchId;

/// Failure reported by a store backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend could not serve the request; retrying may succeed
    #[error("store unavailable during {operation}: {reason}")]
    Unavailable {
        /// Operation that failed
        operation: &'static str,
        /// Backend-specific reason
        reason: String,
    },

    /// Unique key already taken
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Update addressed a row that does not exist
    #[error("missing row: {0}")]
    MissingRow(String),

    /// Item write refused because its batch is completed
    #[error("batch {0} is closed")]
    BatchClosed(BatchId),
}

impl StoreError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }

    /// Check if the failure is transient
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
