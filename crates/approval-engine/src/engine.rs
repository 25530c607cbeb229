//! Engine facade
//!
//! [`ApprovalEngine`] wires the resolver, transition engine, finalize
//! coordinator and intake over one shared store. Guest traffic goes through
//! [`GuestReview`], which is scoped to the batch a link resolved to.

use crate::config::{ConfigError, EngineConfig};
use crate::error::{ApprovalError, ApprovalResult, Missing};
use crate::finalize::{FinalizeCoordinator, FinalizeOutcome};
use crate::intake::Intake;
use crate::link::LinkResolver;
use crate::summary::{self, BatchSummary, DashboardStats};
use crate::transition::TransitionEngine;
use approval_model::{Batch, BatchId, Item, ItemEdit, ItemId, ItemStatus, LinkToken};
use approval_store::ApprovalStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Batch approval engine
#[derive(Debug)]
pub struct ApprovalEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
    resolver: LinkResolver<S>,
    transitions: TransitionEngine<S>,
    finalizer: FinalizeCoordinator<S>,
    intake: Intake<S>,
}

impl<S> Clone for ApprovalEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            resolver: self.resolver.clone(),
            transitions: self.transitions.clone(),
            finalizer: self.finalizer.clone(),
            intake: self.intake.clone(),
        }
    }
}

impl<S: ApprovalStore> ApprovalEngine<S> {
    /// Create engine with default configuration
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self::assemble(store, EngineConfig::default())
    }

    /// Create engine with `config`
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if `config` fails [`EngineConfig::validate`]
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(store, config))
    }

    fn assemble(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            resolver: LinkResolver::new(Arc::clone(&store)),
            transitions: TransitionEngine::new(Arc::clone(&store)),
            finalizer: FinalizeCoordinator::new(Arc::clone(&store)),
            intake: Intake::from_valid(Arc::clone(&store), config.clone()),
            store,
            config,
        }
    }

    /// Shared store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Client registration and batch creation
    #[inline]
    #[must_use]
    pub fn intake(&self) -> &Intake<S> {
        &self.intake
    }

    /// Batch owning `token`, whatever its status
    ///
    /// # Errors
    /// See [`LinkResolver::resolve`].
    pub async fn resolve_link(&self, token: &LinkToken) -> ApprovalResult<Batch> {
        self.resolver.resolve(token).await
    }

    /// Guest session for the batch owning `token`.
    ///
    /// The link is resolved once; later calls address the batch by id.
    ///
    /// # Errors
    /// See [`LinkResolver::resolve`].
    pub async fn guest(&self, token: &LinkToken) -> ApprovalResult<GuestReview<S>> {
        let batch = self.resolver.resolve(token).await?;
        Ok(GuestReview {
            engine: self.clone(),
            batch_id: batch.id,
        })
    }

    /// Operator view of one batch: client name and items in upload order.
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` if the batch is unknown
    /// - `ApprovalError::Persistence` if a read fails
    pub async fn batch_detail(&self, batch_id: BatchId) -> ApprovalResult<ReviewSession> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(ApprovalError::NotFound(Missing::Batch(batch_id)))?;
        let client_name = self.store.get_client(batch.client_id).await?.map(|c| c.name);
        let items = self.store.list_items(batch_id).await?;

        Ok(ReviewSession {
            locked: batch.is_locked(),
            batch,
            client_name,
            items,
        })
    }

    /// Merge annotation fields into an item
    ///
    /// # Errors
    /// See [`TransitionEngine::apply_item_edit`].
    pub async fn apply_item_edit(
        &self,
        batch_id: BatchId,
        item_id: ItemId,
        edit: &ItemEdit,
    ) -> ApprovalResult<Item> {
        self.transitions.apply_item_edit(batch_id, item_id, edit).await
    }

    /// Record a reviewer decision
    ///
    /// # Errors
    /// See [`TransitionEngine::apply_item_status`].
    pub async fn apply_item_status(
        &self,
        batch_id: BatchId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> ApprovalResult<Item> {
        self.transitions.apply_item_status(batch_id, item_id, status).await
    }

    /// Commit every item and close the batch
    ///
    /// # Errors
    /// See [`FinalizeCoordinator::finalize_with_outcome`].
    pub async fn finalize(&self, batch_id: BatchId) -> ApprovalResult<Batch> {
        self.finalizer.finalize(batch_id).await
    }

    /// Like [`ApprovalEngine::finalize`], reporting what was written
    ///
    /// # Errors
    /// See [`FinalizeCoordinator::finalize_with_outcome`].
    pub async fn finalize_with_outcome(&self, batch_id: BatchId) -> ApprovalResult<FinalizeOutcome> {
        self.finalizer.finalize_with_outcome(batch_id).await
    }

    /// Decision counts for one batch
    ///
    /// # Errors
    /// See [`summary::batch_summary`].
    pub async fn batch_summary(&self, batch_id: BatchId) -> ApprovalResult<BatchSummary> {
        summary::batch_summary(self.store.as_ref(), batch_id).await
    }

    /// Workspace totals
    ///
    /// # Errors
    /// See [`summary::dashboard`].
    pub async fn dashboard(&self) -> ApprovalResult<DashboardStats> {
        summary::dashboard(self.store.as_ref()).await
    }

    /// All batches, newest first
    ///
    /// # Errors
    /// See [`summary::list_batches`].
    pub async fn list_batches(&self) -> ApprovalResult<Vec<Batch>> {
        summary::list_batches(self.store.as_ref()).await
    }
}

/// Everything a guest sees on the review page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSession {
    /// Batch under review
    pub batch: Batch,
    /// Owning client's name, if the client still exists
    pub client_name: Option<String>,
    /// Items in upload order
    pub items: Vec<Item>,
    /// True once the batch is finalized; the page is read-only
    pub locked: bool,
}

/// Guest access scoped to one batch
#[derive(Debug)]
pub struct GuestReview<S> {
    engine: ApprovalEngine<S>,
    batch_id: BatchId,
}

impl<S> Clone for GuestReview<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            batch_id: self.batch_id,
        }
    }
}

impl<S: ApprovalStore> GuestReview<S> {
    /// Batch this session is scoped to
    #[inline]
    #[must_use]
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Current state of the batch and its items.
    ///
    /// # Errors
    /// See [`ApprovalEngine::batch_detail`].
    pub async fn review(&self) -> ApprovalResult<ReviewSession> {
        self.engine.batch_detail(self.batch_id).await
    }

    /// Merge annotation fields into an item of this batch
    ///
    /// # Errors
    /// See [`TransitionEngine::apply_item_edit`].
    pub async fn apply_item_edit(&self, item_id: ItemId, edit: &ItemEdit) -> ApprovalResult<Item> {
        self.engine.apply_item_edit(self.batch_id, item_id, edit).await
    }

    /// Record a decision on an item of this batch
    ///
    /// # Errors
    /// See [`TransitionEngine::apply_item_status`].
    pub async fn apply_item_status(&self, item_id: ItemId, status: ItemStatus) -> ApprovalResult<Item> {
        self.engine.apply_item_status(self.batch_id, item_id, status).await
    }

    /// Record a decision given as text.
    ///
    /// The text is parsed before any store access, so an unknown status
    /// fails without reading or writing anything.
    ///
    /// # Errors
    /// - `ApprovalError::Validation` if `status` is not a known status
    /// - anything [`GuestReview::apply_item_status`] returns
    pub async fn apply_item_status_str(&self, item_id: ItemId, status: &str) -> ApprovalResult<Item> {
        let status: ItemStatus = status.parse()?;
        self.apply_item_status(item_id, status).await
    }

    /// Finalize this batch
    ///
    /// # Errors
    /// See [`FinalizeCoordinator::finalize_with_outcome`].
    pub async fn finalize(&self) -> ApprovalResult<Batch> {
        self.engine.finalize(self.batch_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::NewBatch;
    use crate::ErrorKind;
    use approval_model::ValidationError;
    use approval_store::MemoryStore;

    async fn engine_with_batch() -> (ApprovalEngine<MemoryStore>, Batch, Vec<Item>) {
        let engine = ApprovalEngine::new(Arc::new(MemoryStore::new()));
        let client = engine
            .intake()
            .register_client("Acme", "ops@acme.example")
            .await
            .unwrap();
        let created = engine
            .intake()
            .create_batch(NewBatch::new(
                client.id,
                "Spring",
                vec!["a.jpg".to_string(), "b.jpg".to_string()],
            ))
            .await
            .unwrap();
        (engine, created.batch, created.items)
    }

    #[tokio::test]
    async fn guest_review_shows_client_and_items() {
        let (engine, batch, items) = engine_with_batch().await;
        let guest = engine.guest(&batch.link_token).await.unwrap();

        let session = guest.review().await.unwrap();
        assert_eq!(session.client_name.as_deref(), Some("Acme"));
        assert_eq!(session.items, items);
        assert!(!session.locked);
    }

    #[tokio::test]
    async fn batch_detail_matches_guest_view() {
        let (engine, batch, items) = engine_with_batch().await;
        let guest = engine.guest(&batch.link_token).await.unwrap();
        guest.apply_item_status(items[1].id, ItemStatus::Rejected).await.unwrap();

        let detail = engine.batch_detail(batch.id).await.unwrap();
        assert_eq!(detail, guest.review().await.unwrap());
        assert_eq!(detail.client_name.as_deref(), Some("Acme"));
        let refs: Vec<_> = detail.items.iter().map(|i| i.asset_ref.as_str()).collect();
        assert_eq!(refs, vec!["a.jpg", "b.jpg"]);
        assert_eq!(detail.items[1].status, ItemStatus::Rejected);
    }

    #[tokio::test]
    async fn batch_detail_of_unknown_batch_is_not_found() {
        let (engine, _, _) = engine_with_batch().await;
        let missing = BatchId::new();

        let err = engine.batch_detail(missing).await.unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound(Missing::Batch(id)) if id == missing));
    }

    #[test]
    fn invalid_config_is_refused() {
        let err = ApprovalEngine::with_config(
            Arc::new(MemoryStore::new()),
            EngineConfig::new().with_token_length(0),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn unknown_status_text_is_rejected() {
        let (engine, batch, items) = engine_with_batch().await;
        let guest = engine.guest(&batch.link_token).await.unwrap();

        let err = guest
            .apply_item_status_str(items[0].id, "maybe")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert!(matches!(err, ApprovalError::Validation(ValidationError::UnknownStatus(_))));
    }

    #[tokio::test]
    async fn finalized_session_is_locked() {
        let (engine, batch, items) = engine_with_batch().await;
        let guest = engine.guest(&batch.link_token).await.unwrap();

        guest.apply_item_status_str(items[0].id, "approved").await.unwrap();
        guest.finalize().await.unwrap();

        let session = guest.review().await.unwrap();
        assert!(session.locked);
        assert_eq!(session.items[0].status, ItemStatus::Approved);

        let summary = engine.batch_summary(batch.id).await.unwrap();
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.pending, 1);
    }
}
