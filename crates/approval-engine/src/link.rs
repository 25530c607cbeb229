//! Link resolution
//!
//! Possession of a batch's link token is the only thing that authorizes a
//! guest. There is no guest identity beyond that.

use crate::error::{ApprovalError, ApprovalResult, Missing};
use approval_model::{Batch, LinkToken};
use approval_store::BatchStore;
use std::sync::Arc;

/// Maps link tokens to batches
#[derive(Debug)]
pub struct LinkResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for LinkResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BatchStore> LinkResolver<S> {
    /// Create resolver over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Batch whose stored token exactly matches `token`.
    ///
    /// Read-only. Returns the batch whatever its status; callers that intend
    /// to mutate use [`LinkResolver::resolve_open`].
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` if no batch owns the token
    /// - `ApprovalError::Persistence` if the lookup fails
    pub async fn resolve(&self, token: &LinkToken) -> ApprovalResult<Batch> {
        if token.is_blank() {
            return Err(ApprovalError::NotFound(Missing::Link));
        }

        // Tokens are credentials: log the outcome, never the token.
        match self.store.find_batch_by_token(token).await? {
            Some(batch) => {
                tracing::debug!(batch_id = %batch.id, status = %batch.status, "link resolved");
                Ok(batch)
            }
            None => {
                tracing::debug!("link did not resolve");
                Err(ApprovalError::NotFound(Missing::Link))
            }
        }
    }

    /// Like [`LinkResolver::resolve`] but only for batches still open.
    ///
    /// # Errors
    /// - `ApprovalError::BatchLocked` if the batch is completed
    /// - anything [`LinkResolver::resolve`] returns
    pub async fn resolve_open(&self, token: &LinkToken) -> ApprovalResult<Batch> {
        let batch = self.resolve(token).await?;
        if batch.is_locked() {
            return Err(ApprovalError::BatchLocked(batch.id));
        }
        Ok(batch)
    }
}
