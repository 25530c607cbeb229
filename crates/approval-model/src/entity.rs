//! Stored records
//!
//! A [`Batch`] owns its [`Item`]s; a [`Client`] is only referenced.

use crate::ids::{BatchId, ClientId, ItemId, LinkToken};
use crate::status::{BatchStatus, ItemStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer an operator prepares batches for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: ClientId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Create new client record
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(),
            name: name.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Named collection of items shared under one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier
    pub id: BatchId,
    /// Owning client
    pub client_id: ClientId,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Guest access token, assigned once at creation
    pub link_token: LinkToken,
    /// Lifecycle status
    pub status: BatchStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Set when the batch is finalized
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create new open batch
    #[inline]
    #[must_use]
    pub fn new(
        client_id: ClientId,
        name: impl Into<String>,
        description: impl Into<String>,
        link_token: LinkToken,
    ) -> Self {
        Self {
            id: BatchId::new(),
            client_id,
            name: name.into(),
            description: description.into(),
            link_token,
            status: BatchStatus::Open,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether items of this batch are frozen
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy of this batch in the completed state.
    ///
    /// An already completed batch is returned as is, keeping its original
    /// completion time.
    #[must_use]
    pub fn completed(&self, at: DateTime<Utc>) -> Self {
        if self.is_locked() {
            return self.clone();
        }
        Self {
            status: BatchStatus::Completed,
            completed_at: Some(at),
            ..self.clone()
        }
    }
}

/// Single reviewable asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier
    pub id: ItemId,
    /// Owning batch
    pub batch_id: BatchId,
    /// Asset URL or identifier; never interpreted
    pub asset_ref: String,
    /// Upload order within the batch
    pub position: u32,
    /// Short reference label set by the reviewer
    pub label: Option<String>,
    /// Free-text observation set by the reviewer
    pub observation: Option<String>,
    /// Reviewer decision
    pub status: ItemStatus,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create new pending item
    #[inline]
    #[must_use]
    pub fn new(batch_id: BatchId, asset_ref: impl Into<String>, position: u32) -> Self {
        Self {
            id: ItemId::new(),
            batch_id,
            asset_ref: asset_ref.into(),
            position,
            label: None,
            observation: None,
            status: ItemStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Copy with a new status
    #[inline]
    #[must_use]
    pub fn with_status(&self, status: ItemStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Copy with the provided annotation fields merged in
    #[must_use]
    pub fn with_edit(&self, edit: &ItemEdit) -> Self {
        let mut next = self.clone();
        if let Some(label) = &edit.label {
            next.label = normalize_annotation(Some(label.clone()));
        }
        if let Some(observation) = &edit.observation {
            next.observation = normalize_annotation(Some(observation.clone()));
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Partial annotation update.
///
/// `None` leaves a field untouched. `Some(String::new())` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEdit {
    /// New label, if provided
    pub label: Option<String>,
    /// New observation, if provided
    pub observation: Option<String>,
}

impl ItemEdit {
    /// Create empty edit
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With label
    #[inline]
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With observation
    #[inline]
    #[must_use]
    pub fn observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    /// Whether no field is provided
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.observation.is_none()
    }
}

/// Stored form of an annotation: empty text is kept as absent
#[inline]
#[must_use]
pub fn normalize_annotation(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
