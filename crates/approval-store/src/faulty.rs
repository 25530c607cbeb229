//! Fault injection
//!
//! [`FaultyStore`] forwards every call to an inner store unless its
//! [`FaultPlan`] says the call should fail, in which case it returns
//! `StoreError::Unavailable` without touching the inner store. Reads other
//! than `list_items` are never failed.

use crate::error::StoreError;
use crate::repository::{BatchStore, ClientStore, ItemStore};
use approval_model::{Batch, BatchId, Client, ClientId, Item, ItemId, LinkToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Which operations fail next
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// `write_annotations` for these items always fails
    pub fail_annotations_for: HashSet<ItemId>,
    /// The n-th `write_annotations` call (0-based) fails once
    pub fail_annotation_call: Option<usize>,
    /// Number of upcoming `put_item` calls to fail
    pub fail_put_item: usize,
    /// Number of upcoming `complete_batch` calls to fail
    pub fail_complete_batch: usize,
    /// Number of upcoming `list_items` calls to fail
    pub fail_list_items: usize,
    /// Probability that any item or batch write fails
    pub write_failure_rate: f64,
}

impl FaultPlan {
    /// Plan with no faults
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Fail annotation writes for `id` until healed
    #[inline]
    #[must_use]
    pub fn fail_annotations_for(mut self, id: ItemId) -> Self {
        self.fail_annotations_for.insert(id);
        self
    }

    /// Fail the n-th annotation write
    #[inline]
    #[must_use]
    pub fn fail_annotation_call(mut self, n: usize) -> Self {
        self.fail_annotation_call = Some(n);
        self
    }

    /// Fail the next `count` full-row item writes
    #[inline]
    #[must_use]
    pub fn fail_put_item(mut self, count: usize) -> Self {
        self.fail_put_item = count;
        self
    }

    /// Fail the next `count` batch completions
    #[inline]
    #[must_use]
    pub fn fail_complete_batch(mut self, count: usize) -> Self {
        self.fail_complete_batch = count;
        self
    }

    /// Fail the next `count` item listings
    #[inline]
    #[must_use]
    pub fn fail_list_items(mut self, count: usize) -> Self {
        self.fail_list_items = count;
        self
    }

    /// Fail writes at random with probability `rate`
    #[inline]
    #[must_use]
    pub fn with_write_failure_rate(mut self, rate: f64) -> Self {
        self.write_failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

/// Counters kept by a [`FaultyStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Annotation writes attempted, failed ones included
    pub annotation_writes: usize,
    /// Full-row item writes attempted
    pub item_writes: usize,
    /// Batch completions attempted
    pub batch_completions: usize,
    /// Calls that were failed on purpose
    pub injected_failures: usize,
}

#[derive(Debug)]
struct FaultState {
    plan: FaultPlan,
    stats: FaultStats,
    rng: StdRng,
}

/// Store wrapper that fails operations according to a [`FaultPlan`]
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    state: Mutex<FaultState>,
}

impl<S> FaultyStore<S> {
    /// Wrap `inner` with an empty plan
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self::with_seed(inner, 42)
    }

    /// Wrap `inner`, seeding the random failure generator
    #[must_use]
    pub fn with_seed(inner: S, seed: u64) -> Self {
        Self {
            inner,
            state: Mutex::new(FaultState {
                plan: FaultPlan::none(),
                stats: FaultStats::default(),
                rng: StdRng::seed_from_u64(seed),
            }),
        }
    }

    /// Replace the current plan
    pub fn set_plan(&self, plan: FaultPlan) {
        self.state.lock().plan = plan;
    }

    /// Clear every pending fault
    pub fn heal(&self) {
        self.set_plan(FaultPlan::none());
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.state.lock().stats
    }

    /// The wrapped store
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn injected(operation: &'static str) -> StoreError {
        tracing::debug!(operation, "injecting store failure");
        StoreError::unavailable(operation, "injected fault")
    }

    fn roll(state: &mut FaultState) -> bool {
        let rate = state.plan.write_failure_rate;
        rate > 0.0 && state.rng.random_bool(rate)
    }

    fn take(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    fn check_annotation_write(&self, id: ItemId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let call = state.stats.annotation_writes;
        state.stats.annotation_writes += 1;

        let scheduled = state.plan.fail_annotation_call == Some(call);
        if scheduled {
            state.plan.fail_annotation_call = None;
        }
        let fail = scheduled || state.plan.fail_annotations_for.contains(&id) || Self::roll(&mut state);
        if fail {
            state.stats.injected_failures += 1;
            return Err(Self::injected("write_annotations"));
        }
        Ok(())
    }

    fn check_put_item(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.stats.item_writes += 1;
        let fail = Self::take(&mut state.plan.fail_put_item) || Self::roll(&mut state);
        if fail {
            state.stats.injected_failures += 1;
            return Err(Self::injected("put_item"));
        }
        Ok(())
    }

    fn check_complete_batch(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.stats.batch_completions += 1;
        let fail = Self::take(&mut state.plan.fail_complete_batch) || Self::roll(&mut state);
        if fail {
            state.stats.injected_failures += 1;
            return Err(Self::injected("complete_batch"));
        }
        Ok(())
    }

    fn check_list_items(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if Self::take(&mut state.plan.fail_list_items) {
            state.stats.injected_failures += 1;
            return Err(Self::injected("list_items"));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ClientStore> ClientStore for FaultyStore<S> {
    async fn insert_client(&self, client: Client) -> Result<(), StoreError> {
        self.inner.insert_client(client).await
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        self.inner.get_client(id).await
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        self.inner.list_clients().await
    }

    async fn delete_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        self.inner.delete_client(id).await
    }
}

#[async_trait]
impl<S: BatchStore> BatchStore for FaultyStore<S> {
    async fn insert_batch(&self, batch: Batch) -> Result<(), StoreError> {
        self.inner.insert_batch(batch).await
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        self.inner.get_batch(id).await
    }

    async fn find_batch_by_token(&self, token: &LinkToken) -> Result<Option<Batch>, StoreError> {
        self.inner.find_batch_by_token(token).await
    }

    async fn list_batches(&self) -> Result<Vec<Batch>, StoreError> {
        self.inner.list_batches().await
    }

    async fn complete_batch(&self, id: BatchId, at: DateTime<Utc>) -> Result<Batch, StoreError> {
        self.check_complete_batch()?;
        self.inner.complete_batch(id, at).await
    }
}

#[async_trait]
impl<S: ItemStore> ItemStore for FaultyStore<S> {
    async fn insert_items(&self, items: Vec<Item>) -> Result<(), StoreError> {
        self.inner.insert_items(items).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(id).await
    }

    async fn list_items(&self, batch_id: BatchId) -> Result<Vec<Item>, StoreError> {
        self.check_list_items()?;
        self.inner.list_items(batch_id).await
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.check_put_item()?;
        self.inner.put_item(item).await
    }

    async fn write_annotations(
        &self,
        id: ItemId,
        label: Option<String>,
        observation: Option<String>,
    ) -> Result<(), StoreError> {
        self.check_annotation_write(id)?;
        self.inner.write_annotations(id, label, observation).await
    }
}
