//! Item transitions
//!
//! Validates and applies one reviewer change at a time. Each successful
//! call writes the full item row exactly once, status and annotations
//! together, so the finalize sweep always re-reads the latest combined
//! state.
//!
//! The owning batch is re-read on every call. Nothing is cached between
//! calls and no lock is taken: two tabs editing the same item resolve to
//! whichever write the store applies last.
//!
//! A finalize can complete the batch after the open check and before the
//! write. The store only applies item writes while the batch is open, so
//! that write is refused and the call reports `BatchLocked`.

use crate::error::{ApprovalError, ApprovalResult, Missing};
use approval_model::{
    validate_item_transition, Batch, BatchId, Item, ItemEdit, ItemId, ItemStatus, ValidationError,
};
use approval_store::{BatchStore, ItemStore};
use std::sync::Arc;

/// Applies reviewer edits and decisions to items of open batches
#[derive(Debug)]
pub struct TransitionEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for TransitionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BatchStore + ItemStore> TransitionEngine<S> {
    /// Create engine over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Merge the provided annotation fields into an item.
    ///
    /// Omitted fields keep their value; an empty string clears a field.
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` if the batch or item is unknown, or the
    ///   item belongs to another batch
    /// - `ApprovalError::BatchLocked` if the batch is completed, including
    ///   by a finalize that lands before the write
    /// - `ApprovalError::Persistence` if the write fails
    pub async fn apply_item_edit(
        &self,
        batch_id: BatchId,
        item_id: ItemId,
        edit: &ItemEdit,
    ) -> ApprovalResult<Item> {
        self.load_open_batch(batch_id).await?;
        let item = self.load_item(batch_id, item_id).await?;

        let next = item.with_edit(edit);
        self.store.put_item(next.clone()).await?;

        tracing::debug!(%batch_id, %item_id, "item annotations updated");
        Ok(next)
    }

    /// Record a reviewer decision.
    ///
    /// Only `approved` and `rejected` are accepted. Re-applying the current
    /// decision succeeds and returns the item unchanged.
    ///
    /// # Errors
    /// - `ApprovalError::BatchLocked` if the batch is completed, including
    ///   by a finalize that lands before the write
    /// - `ApprovalError::Validation` if `status` is `pending`
    /// - `ApprovalError::NotFound` if the batch or item is unknown
    /// - `ApprovalError::Persistence` if the write fails
    pub async fn apply_item_status(
        &self,
        batch_id: BatchId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> ApprovalResult<Item> {
        self.load_open_batch(batch_id).await?;
        if status == ItemStatus::Pending {
            return Err(ValidationError::PendingTarget.into());
        }
        let item = self.load_item(batch_id, item_id).await?;
        validate_item_transition(item.status, status)?;

        let next = if item.status == status {
            tracing::debug!(%batch_id, %item_id, %status, "decision already recorded");
            item
        } else {
            item.with_status(status)
        };
        self.store.put_item(next.clone()).await?;

        tracing::debug!(%batch_id, %item_id, %status, "item decision recorded");
        Ok(next)
    }

    async fn load_open_batch(&self, batch_id: BatchId) -> ApprovalResult<Batch> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(ApprovalError::NotFound(Missing::Batch(batch_id)))?;

        if batch.is_locked() {
            return Err(ApprovalError::BatchLocked(batch_id));
        }
        Ok(batch)
    }

    async fn load_item(&self, batch_id: BatchId, item_id: ItemId) -> ApprovalResult<Item> {
        self.store
            .get_item(item_id)
            .await?
            .filter(|item| item.batch_id == batch_id)
            .ok_or(ApprovalError::NotFound(Missing::Item(item_id)))
    }
}
