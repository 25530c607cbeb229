//! Approval Model
//!
//! Plain data for the batch approval workflow:
//! - Identifiers for clients, batches and items
//! - The opaque [`LinkToken`] shared with guest reviewers
//! - [`Batch`] and [`Item`] records with their status enums
//! - Transition tables for both state machines
//!
//! Nothing in this crate touches storage. The engine crate loads these
//! records from a store, runs them through the state machines and writes
//! them back.
//!
//! # Example
//!
//! ```rust
//! use approval_model::{validate_item_transition, ItemStatus};
//!
//! assert!(validate_item_transition(ItemStatus::Pending, ItemStatus::Approved).is_ok());
//! assert!(validate_item_transition(ItemStatus::Approved, ItemStatus::Pending).is_err());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod entity;
mod error;
mod ids;
mod state_machine;
mod status;

pub use entity::{normalize_annotation, Batch, Client, Item, ItemEdit};
pub use error::ValidationError;
pub use ids::{BatchId, ClientId, ItemId, LinkToken};
pub use state_machine::{
    allowed_batch_transitions, allowed_item_transitions, validate_batch_transition,
    validate_item_transition,
};
pub use status::{BatchStatus, ItemStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
