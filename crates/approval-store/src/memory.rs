//! In-memory store
//!
//! Rows live in `DashMap`s; each point update holds one shard lock for the
//! duration of the write, which gives per-row atomicity and nothing more.
//! Item writes also hold a read guard on the owning batch row, so a batch
//! cannot complete between the open check and the write. Lock order is
//! always item then batch. All state is lost on drop.

use crate::error::StoreError;
use crate::repository::{BatchStore, ClientStore, ItemStore};
use approval_model::{
    normalize_annotation, Batch, BatchId, Client, ClientId, Item, ItemId, LinkToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// DashMap-backed store
#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: DashMap<ClientId, Client>,
    batches: DashMap<BatchId, Batch>,
    /// Reverse index: raw token -> batch
    tokens: DashMap<String, BatchId>,
    items: DashMap<ItemId, Item>,
    /// Children index: batch -> item ids
    by_batch: DashMap<BatchId, Vec<ItemId>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    #[inline]
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Run `write` on an item row while its batch row is held open
    fn write_item_row(
        &self,
        id: ItemId,
        write: impl FnOnce(&mut Item),
    ) -> Result<(), StoreError> {
        let mut row = self
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("item {id}")))?;
        let batch_id = row.batch_id;
        let batch = self
            .batches
            .get(&batch_id)
            .ok_or_else(|| StoreError::MissingRow(format!("batch {batch_id}")))?;
        if batch.is_locked() {
            return Err(StoreError::BatchClosed(batch_id));
        }
        write(row.value_mut());
        drop(batch);
        Ok(())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn insert_client(&self, client: Client) -> Result<(), StoreError> {
        match self.clients.entry(client.id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(format!("client {}", client.id))),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(&id).map(|c| c.value().clone()))
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let mut clients: Vec<Client> = self.clients.iter().map(|c| c.value().clone()).collect();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(clients)
    }

    async fn delete_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.remove(&id).map(|(_, client)| client))
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn insert_batch(&self, batch: Batch) -> Result<(), StoreError> {
        if self.batches.contains_key(&batch.id) {
            return Err(StoreError::DuplicateKey(format!("batch {}", batch.id)));
        }

        match self.tokens.entry(batch.link_token.as_str().to_string()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(format!(
                "link token {}",
                batch.link_token
            ))),
            Entry::Vacant(slot) => {
                slot.insert(batch.id);
                self.by_batch.entry(batch.id).or_default();
                self.batches.insert(batch.id, batch);
                Ok(())
            }
        }
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.batches.get(&id).map(|b| b.value().clone()))
    }

    async fn find_batch_by_token(&self, token: &LinkToken) -> Result<Option<Batch>, StoreError> {
        let Some(id) = self.tokens.get(token.as_str()).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.get_batch(id).await
    }

    async fn list_batches(&self) -> Result<Vec<Batch>, StoreError> {
        let mut batches: Vec<Batch> = self.batches.iter().map(|b| b.value().clone()).collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(batches)
    }

    async fn complete_batch(&self, id: BatchId, at: DateTime<Utc>) -> Result<Batch, StoreError> {
        let mut row = self
            .batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("batch {id}")))?;
        let next = row.completed(at);
        *row = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert_items(&self, items: Vec<Item>) -> Result<(), StoreError> {
        if let Some(dup) = items.iter().find(|item| self.items.contains_key(&item.id)) {
            return Err(StoreError::DuplicateKey(format!("item {}", dup.id)));
        }

        for item in items {
            self.by_batch.entry(item.batch_id).or_default().push(item.id);
            self.items.insert(item.id, item);
        }
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.items.get(&id).map(|i| i.value().clone()))
    }

    async fn list_items(&self, batch_id: BatchId) -> Result<Vec<Item>, StoreError> {
        let ids = self
            .by_batch
            .get(&batch_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        let mut items: Vec<Item> = ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|i| i.value().clone()))
            .collect();
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.write_item_row(item.id, |row| *row = item)
    }

    async fn write_annotations(
        &self,
        id: ItemId,
        label: Option<String>,
        observation: Option<String>,
    ) -> Result<(), StoreError> {
        self.write_item_row(id, |row| {
            row.label = normalize_annotation(label);
            row.observation = normalize_annotation(observation);
            row.updated_at = Utc::now();
        })
    }
}
