//! Testing utilities for the approval workspace
//!
//! Shared fixtures: an engine over a fault-injecting in-memory store with
//! one client and one open batch.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use approval_engine::{ApprovalEngine, EngineConfig, GuestReview, NewBatch};
use approval_model::{Batch, Client, Item, ItemEdit};
use approval_store::{FaultyStore, ItemStore, MemoryStore};
use std::sync::Arc;

pub type TestStore = FaultyStore<MemoryStore>;

/// Engine, store and one freshly created batch
pub struct Fixture {
    pub engine: ApprovalEngine<TestStore>,
    pub store: Arc<TestStore>,
    pub client: Client,
    pub batch: Batch,
    pub items: Vec<Item>,
}

impl Fixture {
    /// Guest session through the batch's link
    pub async fn guest(&self) -> GuestReview<TestStore> {
        self.engine.guest(&self.batch.link_token).await.unwrap()
    }

    /// Items as currently stored, in upload order
    pub async fn stored_items(&self) -> Vec<Item> {
        self.store.list_items(self.batch.id).await.unwrap()
    }

    /// Set label and observation on the item at `index`
    pub async fn annotate(&self, index: usize, label: &str, observation: &str) -> Item {
        self.engine
            .apply_item_edit(
                self.batch.id,
                self.items[index].id,
                &ItemEdit::new().label(label).observation(observation),
            )
            .await
            .unwrap()
    }
}

pub fn asset_refs(count: u32) -> Vec<String> {
    (0..count)
        .map(|n| format!("https://cdn.test/batch/{n}.jpg"))
        .collect()
}

pub fn test_store() -> Arc<TestStore> {
    Arc::new(FaultyStore::new(MemoryStore::new()))
}

pub async fn setup_batch(items: u32) -> Fixture {
    setup_batch_with_config(items, EngineConfig::default()).await
}

pub async fn setup_batch_with_config(items: u32, config: EngineConfig) -> Fixture {
    let store = test_store();
    let engine = ApprovalEngine::with_config(Arc::clone(&store), config).unwrap();
    let client = engine
        .intake()
        .register_client("Test Client", "client@approval.test")
        .await
        .unwrap();
    let created = engine
        .intake()
        .create_batch(NewBatch::new(client.id, "Test batch", asset_refs(items)))
        .await
        .unwrap();

    Fixture {
        engine,
        store,
        client,
        batch: created.batch,
        items: created.items,
    }
}
