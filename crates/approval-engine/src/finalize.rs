//! Finalize
//!
//! Commits every item and closes the batch as one logical unit built from
//! separate single-row writes:
//!
//! 1. load the item list
//! 2. rewrite each item's current annotations, in upload order
//! 3. move the batch row to `completed`
//!
//! The writes are not wrapped in a transaction. A failure at any step stops
//! the call with the batch still open; items written before the failure
//! stay written. Each write stores a value over itself, so calling
//! `finalize` again re-applies the same values and carries on from there.
//!
//! Item writes only land while the batch is open. If a concurrent finalize
//! closes the batch mid-sweep, this call stops writing and reports the batch
//! as already completed.

use crate::error::{ApprovalError, ApprovalResult, FinalizeStage, Missing};
use approval_model::{validate_batch_transition, Batch, BatchId, BatchStatus};
use approval_store::{BatchStore, ItemStore, StoreError};
use chrono::Utc;
use std::sync::Arc;

/// What a successful finalize call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Batch in its completed state
    pub batch: Batch,
    /// Item rows written by this call
    pub items_swept: usize,
    /// Batch was already completed; nothing was written
    pub already_completed: bool,
}

/// Runs the finalize sweep and closes batches
#[derive(Debug)]
pub struct FinalizeCoordinator<S> {
    store: Arc<S>,
}

impl<S> Clone for FinalizeCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BatchStore + ItemStore> FinalizeCoordinator<S> {
    /// Create coordinator over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Finalize a batch, returning it in the completed state.
    ///
    /// # Errors
    /// See [`FinalizeCoordinator::finalize_with_outcome`].
    pub async fn finalize(&self, batch_id: BatchId) -> ApprovalResult<Batch> {
        self.finalize_with_outcome(batch_id).await.map(|outcome| outcome.batch)
    }

    /// Finalize a batch and report how much was written.
    ///
    /// A batch that is already completed is returned unchanged without any
    /// write.
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` if the batch is unknown
    /// - `ApprovalError::FinalizeIncomplete` if a store call fails; the
    ///   batch is still open and the call can be repeated
    pub async fn finalize_with_outcome(&self, batch_id: BatchId) -> ApprovalResult<FinalizeOutcome> {
        let batch = self.load_batch(batch_id).await?;

        if batch.is_locked() {
            tracing::info!(%batch_id, "batch already finalized");
            return Ok(FinalizeOutcome {
                batch,
                items_swept: 0,
                already_completed: true,
            });
        }

        tracing::info!(%batch_id, "finalizing batch");

        let items = self
            .store
            .list_items(batch_id)
            .await
            .map_err(|source| incomplete(batch_id, FinalizeStage::LoadItems, source))?;
        let total = items.len();

        for (committed, item) in items.into_iter().enumerate() {
            if let Err(source) = self
                .store
                .write_annotations(item.id, item.label, item.observation)
                .await
            {
                if matches!(source, StoreError::BatchClosed(_)) {
                    tracing::info!(%batch_id, committed, "batch closed by a concurrent finalize");
                    return Ok(FinalizeOutcome {
                        batch: self.load_batch(batch_id).await?,
                        items_swept: committed,
                        already_completed: true,
                    });
                }
                tracing::warn!(
                    %batch_id,
                    item_id = %item.id,
                    committed,
                    total,
                    error = %source,
                    "finalize sweep halted"
                );
                return Err(incomplete(
                    batch_id,
                    FinalizeStage::ItemSweep { committed, total },
                    source,
                ));
            }
        }

        validate_batch_transition(batch.status, BatchStatus::Completed)?;
        let closed = self
            .store
            .complete_batch(batch_id, Utc::now())
            .await
            .map_err(|source| {
                tracing::warn!(%batch_id, error = %source, "batch close failed after sweep");
                incomplete(batch_id, FinalizeStage::CloseBatch, source)
            })?;

        tracing::info!(%batch_id, items = total, "batch finalized");
        Ok(FinalizeOutcome {
            batch: closed,
            items_swept: total,
            already_completed: false,
        })
    }

    async fn load_batch(&self, batch_id: BatchId) -> ApprovalResult<Batch> {
        self.store
            .get_batch(batch_id)
            .await
            .map_err(|source| incomplete(batch_id, FinalizeStage::LoadBatch, source))?
            .ok_or(ApprovalError::NotFound(Missing::Batch(batch_id)))
    }
}

fn incomplete(batch_id: BatchId, stage: FinalizeStage, source: StoreError) -> ApprovalError {
    ApprovalError::FinalizeIncomplete {
        batch_id,
        stage,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_model::{ClientId, Item, ItemEdit, ItemStatus, LinkToken};
    use approval_store::{FaultPlan, FaultyStore, MemoryStore};

    async fn fixture(count: u32) -> (Arc<FaultyStore<MemoryStore>>, Batch, Vec<Item>) {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let batch = Batch::new(ClientId::new(), "Autumn", "", LinkToken::new("fin00000"));
        store.insert_batch(batch.clone()).await.unwrap();
        let items: Vec<Item> = (0..count)
            .map(|n| {
                Item::new(batch.id, format!("asset-{n}"), n)
                    .with_edit(&ItemEdit::new().label(format!("REF-{n}")))
            })
            .collect();
        store.insert_items(items.clone()).await.unwrap();
        (store, batch, items)
    }

    #[tokio::test]
    async fn finalize_completes_open_batch() {
        let (store, batch, _) = fixture(3).await;
        let coordinator = FinalizeCoordinator::new(store.clone());

        let outcome = coordinator.finalize_with_outcome(batch.id).await.unwrap();
        assert_eq!(outcome.batch.status, BatchStatus::Completed);
        assert_eq!(outcome.items_swept, 3);
        assert!(!outcome.already_completed);
        assert_eq!(store.stats().annotation_writes, 3);
    }

    #[tokio::test]
    async fn second_finalize_writes_nothing() {
        let (store, batch, _) = fixture(2).await;
        let coordinator = FinalizeCoordinator::new(store.clone());

        let first = coordinator.finalize(batch.id).await.unwrap();
        let writes = store.stats().annotation_writes;
        let second = coordinator.finalize_with_outcome(batch.id).await.unwrap();

        assert_eq!(first, second.batch);
        assert!(second.already_completed);
        assert_eq!(store.stats().annotation_writes, writes);
    }

    #[tokio::test]
    async fn unknown_batch_is_not_found() {
        let (store, _, _) = fixture(1).await;
        let coordinator = FinalizeCoordinator::new(store);

        let err = coordinator.finalize(BatchId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_load_leaves_batch_open() {
        let (store, batch, _) = fixture(2).await;
        store.set_plan(FaultPlan::none().fail_list_items(1));
        let coordinator = FinalizeCoordinator::new(store.clone());

        let err = coordinator.finalize(batch.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::FinalizeIncomplete { stage: FinalizeStage::LoadItems, .. }
        ));
        assert_eq!(store.stats().annotation_writes, 0);

        let batch = store.get_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Open);
    }

    #[tokio::test]
    async fn failed_close_keeps_sweep_and_retries_cleanly() {
        let (store, batch, items) = fixture(2).await;
        store.set_plan(FaultPlan::none().fail_complete_batch(1));
        let coordinator = FinalizeCoordinator::new(store.clone());

        let err = coordinator.finalize(batch.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::FinalizeIncomplete { stage: FinalizeStage::CloseBatch, .. }
        ));
        assert!(err.is_retryable());
        assert_eq!(
            store.get_batch(batch.id).await.unwrap().unwrap().status,
            BatchStatus::Open
        );

        let closed = coordinator.finalize(batch.id).await.unwrap();
        assert_eq!(closed.status, BatchStatus::Completed);
        for item in items {
            let stored = store.get_item(item.id).await.unwrap().unwrap();
            assert_eq!(stored.label, item.label);
            assert_eq!(stored.status, ItemStatus::Pending);
        }
    }
}
