//! Batch and item status values

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Accepting reviewer decisions
    #[default]
    Open,
    /// Finalized; items are frozen
    Completed,
}

impl BatchStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Open => "open",
            BatchStatus::Completed => "completed",
        }
    }

    /// Whether no further transition can leave this state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(BatchStatus::Open),
            "completed" => Ok(BatchStatus::Completed),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Reviewer decision on a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Not yet decided
    #[default]
    Pending,
    /// Accepted by the reviewer
    Approved,
    /// Turned down by the reviewer
    Rejected,
}

impl ItemStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }

    /// Whether a reviewer has decided this item
    #[inline]
    #[must_use]
    pub fn is_decided(&self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            "rejected" => Ok(ItemStatus::Rejected),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}
