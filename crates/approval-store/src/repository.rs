//! Store traits
//!
//! Backends only need point reads, point updates and list-by-parent.
//! They are assumed to give a caller read-your-writes on its own next read;
//! nothing stronger, and in particular no multi-row transactions.

use crate::error::StoreError;
use approval_model::{Batch, BatchId, Client, ClientId, Item, ItemId, LinkToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Client directory
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Insert a new client.
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` if the id is taken
    async fn insert_client(&self, client: Client) -> Result<(), StoreError>;

    /// Get a client, `None` if absent
    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// All clients, newest first
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;

    /// Remove a client, returning it if it existed
    async fn delete_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;
}

/// Batch records and the link token index
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Insert a new batch and claim its link token.
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` if the id or the token is taken
    async fn insert_batch(&self, batch: Batch) -> Result<(), StoreError>;

    /// Get a batch, `None` if absent
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    /// Batch owning exactly this token, `None` if no batch does
    async fn find_batch_by_token(&self, token: &LinkToken) -> Result<Option<Batch>, StoreError>;

    /// All batches, newest first
    async fn list_batches(&self) -> Result<Vec<Batch>, StoreError>;

    /// Move one batch row from `open` to `completed`.
    ///
    /// A batch that is already completed is returned unchanged.
    ///
    /// # Errors
    /// - `StoreError::MissingRow` if the batch does not exist
    async fn complete_batch(&self, id: BatchId, at: DateTime<Utc>) -> Result<Batch, StoreError>;
}

/// Review items, owned by batches
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert items created alongside their batch
    async fn insert_items(&self, items: Vec<Item>) -> Result<(), StoreError>;

    /// Get an item, `None` if absent
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Items of a batch in upload order
    async fn list_items(&self, batch_id: BatchId) -> Result<Vec<Item>, StoreError>;

    /// Overwrite a full item row, status and annotations together.
    ///
    /// The write is applied only while the owning batch is open, checked
    /// atomically with the write itself.
    ///
    /// # Errors
    /// - `StoreError::MissingRow` if the item or its batch does not exist
    /// - `StoreError::BatchClosed` if the owning batch is completed
    async fn put_item(&self, item: Item) -> Result<(), StoreError>;

    /// Overwrite only the annotation columns of an item row.
    ///
    /// Same open-batch condition as [`ItemStore::put_item`].
    ///
    /// # Errors
    /// - `StoreError::MissingRow` if the item or its batch does not exist
    /// - `StoreError::BatchClosed` if the owning batch is completed
    async fn write_annotations(
        &self,
        id: ItemId,
        label: Option<String>,
        observation: Option<String>,
    ) -> Result<(), StoreError>;
}

/// Backend serving every store the engine needs
pub trait ApprovalStore: ClientStore + BatchStore + ItemStore {}

impl<T> ApprovalStore for T where T: ClientStore + BatchStore + ItemStore {}
