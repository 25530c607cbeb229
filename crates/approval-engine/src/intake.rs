//! Operator intake
//!
//! Registers clients and creates batches. This is the only place link
//! tokens are minted; everything downstream treats them as opaque.

use crate::config::{ConfigError, EngineConfig};
use crate::error::{ApprovalError, ApprovalResult, Missing};
use approval_model::{Batch, Client, ClientId, Item, LinkToken, ValidationError};
use approval_store::{BatchStore, ClientStore, ItemStore, StoreError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Characters a random token is drawn from
pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Source of fresh link tokens
pub trait LinkIssuer: Send + Sync + fmt::Debug {
    /// Produce a candidate token. Uniqueness is checked by the store.
    fn issue(&self) -> LinkToken;
}

/// Random `[a-z0-9]` tokens of fixed length
#[derive(Debug, Clone, Copy)]
pub struct RandomLinkIssuer {
    length: usize,
}

impl RandomLinkIssuer {
    /// Create issuer producing `length` character tokens
    #[inline]
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomLinkIssuer {
    fn default() -> Self {
        Self::new(8)
    }
}

impl LinkIssuer for RandomLinkIssuer {
    fn issue(&self) -> LinkToken {
        let mut rng = rand::rng();
        let token: String = (0..self.length)
            .map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
            .collect();
        LinkToken::new(token)
    }
}

/// Request to create a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    /// Owning client
    pub client_id: ClientId,
    /// Display name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Asset references in upload order
    pub assets: Vec<String>,
}

impl NewBatch {
    /// Create request without description
    #[must_use]
    pub fn new(client_id: ClientId, name: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            client_id,
            name: name.into(),
            description: String::new(),
            assets,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Freshly created batch with its items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBatch {
    /// Stored batch, open
    pub batch: Batch,
    /// Stored items, pending, in upload order
    pub items: Vec<Item>,
}

/// Client registration and batch creation
pub struct Intake<S> {
    store: Arc<S>,
    config: EngineConfig,
    issuer: Arc<dyn LinkIssuer>,
}

impl<S> fmt::Debug for Intake<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intake")
            .field("config", &self.config)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl<S> Clone for Intake<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            issuer: Arc::clone(&self.issuer),
        }
    }
}

impl<S: ClientStore + BatchStore + ItemStore> Intake<S> {
    /// Create intake using random tokens of the configured length
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if `config` fails [`EngineConfig::validate`]
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(store, config))
    }

    pub(crate) fn from_valid(store: Arc<S>, config: EngineConfig) -> Self {
        let issuer = Arc::new(RandomLinkIssuer::new(config.link.token_length));
        Self {
            store,
            config,
            issuer,
        }
    }

    /// With a different token source
    #[inline]
    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<dyn LinkIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Register a client.
    ///
    /// # Errors
    /// - `ApprovalError::Validation` if the name is blank or the email has
    ///   no `@`
    /// - `ApprovalError::Persistence` if the insert fails
    pub async fn register_client(&self, name: &str, email: &str) -> ApprovalResult<Client> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name").into());
        }
        if !email.contains('@') {
            return Err(ValidationError::InvalidEmail(email.to_string()).into());
        }

        let client = Client::new(name, email);
        self.store.insert_client(client.clone()).await?;
        tracing::info!(client_id = %client.id, "client registered");
        Ok(client)
    }

    /// Registered clients, newest first
    ///
    /// # Errors
    /// - `ApprovalError::Persistence` if the read fails
    pub async fn clients(&self) -> ApprovalResult<Vec<Client>> {
        Ok(self.store.list_clients().await?)
    }

    /// Remove a client that owns no batches.
    ///
    /// The batch scan and the delete are separate calls; a batch created
    /// in between is left pointing at a missing client.
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` if the client is unknown
    /// - `ApprovalError::Validation` if any batch references the client
    /// - `ApprovalError::Persistence` if a store call fails
    pub async fn remove_client(&self, client_id: ClientId) -> ApprovalResult<Client> {
        let batches = self
            .store
            .list_batches()
            .await?
            .into_iter()
            .filter(|batch| batch.client_id == client_id)
            .count();
        if batches > 0 {
            return Err(ValidationError::ClientInUse { batches }.into());
        }

        let client = self
            .store
            .delete_client(client_id)
            .await?
            .ok_or(ApprovalError::NotFound(Missing::Client(client_id)))?;
        tracing::info!(%client_id, "client removed");
        Ok(client)
    }

    /// Create an open batch with one pending item per asset.
    ///
    /// Batch and items are separate inserts. If the item insert fails the
    /// batch row remains, open and empty.
    ///
    /// # Errors
    /// - `ApprovalError::Validation` on a blank name, no assets, or more
    ///   assets than configured
    /// - `ApprovalError::NotFound` if the client is unknown
    /// - `ApprovalError::Persistence` if a write fails or every minted token
    ///   collided
    pub async fn create_batch(&self, request: NewBatch) -> ApprovalResult<CreatedBatch> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name").into());
        }
        if request.assets.is_empty() {
            return Err(ValidationError::NoAssets.into());
        }
        let limit = self.config.max_assets_per_batch;
        if request.assets.len() > limit {
            return Err(ValidationError::TooManyAssets {
                count: request.assets.len(),
                limit,
            }
            .into());
        }

        let client_id = request.client_id;
        if self.store.get_client(client_id).await?.is_none() {
            return Err(ApprovalError::NotFound(Missing::Client(client_id)));
        }

        let batch = self
            .insert_with_fresh_token(client_id, name, &request.description)
            .await?;

        let items = request
            .assets
            .into_iter()
            .zip(0u32..)
            .map(|(asset, position)| Item::new(batch.id, asset, position))
            .collect::<Vec<_>>();
        self.store.insert_items(items.clone()).await?;

        tracing::info!(batch_id = %batch.id, %client_id, items = items.len(), "batch created");
        Ok(CreatedBatch { batch, items })
    }

    async fn insert_with_fresh_token(
        &self,
        client_id: ClientId,
        name: &str,
        description: &str,
    ) -> ApprovalResult<Batch> {
        let attempts = self.config.link.max_issue_attempts;
        for attempt in 1..=attempts {
            let batch = Batch::new(client_id, name, description, self.issuer.issue());
            match self.store.insert_batch(batch.clone()).await {
                Ok(()) => return Ok(batch),
                Err(StoreError::DuplicateKey(_)) => {
                    tracing::warn!(attempt, attempts, "link token collision, reissuing");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::DuplicateKey(format!("link token after {attempts} attempts")).into())
    }
}
