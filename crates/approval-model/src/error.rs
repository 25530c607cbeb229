//! Input validation errors
//!
//! Raised before any store access; a validation failure never has a
//! partial effect.

/// Malformed or disallowed input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Status string outside the known set
    #[error("unknown status: '{0}'")]
    UnknownStatus(String),

    /// Items can only be decided, never returned to pending
    #[error("items cannot be returned to pending")]
    PendingTarget,

    /// Transition not present in the state table
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: &'static str,
        /// Requested state
        to: &'static str,
    },

    /// Required text field was empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Email without an `@`
    #[error("invalid email: '{0}'")]
    InvalidEmail(String),

    /// A batch needs at least one asset
    #[error("a batch needs at least one asset")]
    NoAssets,

    /// Client still owns batches and cannot be removed
    #[error("client is referenced by {batches} batch(es)")]
    ClientInUse {
        /// Batches owned by the client
        batches: usize,
    },

    /// Too many assets for one batch
    #[error("too many assets: {count} (max: {limit})")]
    TooManyAssets {
        /// Assets supplied
        count: usize,
        /// Configured limit
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        assert_eq!(
            ValidationError::UnknownStatus("x".to_string()).to_string(),
            "unknown status: 'x'"
        );
        assert_eq!(
            ValidationError::TooManyAssets { count: 3, limit: 2 }.to_string(),
            "too many assets: 3 (max: 2)"
        );
    }
}
