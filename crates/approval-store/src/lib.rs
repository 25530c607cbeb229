//! Approval Store
//!
//! Persistence seams for the approval engine.
//!
//! # Core Concepts
//!
//! - [`ClientStore`], [`BatchStore`], [`ItemStore`]: point reads, point
//!   updates and list-by-parent, nothing more
//! - [`ApprovalStore`]: blanket trait for a backend implementing all three
//! - [`MemoryStore`]: DashMap-backed backend with a link token index
//! - [`FaultyStore`]: wrapper that fails chosen operations on demand
//!
//! Every write touches exactly one row. Concurrent writes to the same row
//! resolve last-write-wins; the stores do no conflict detection.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod faulty;
mod memory;
mod repository;

pub use error::StoreError;
pub use faulty::{FaultPlan, FaultStats, FaultyStore};
pub use memory::MemoryStore;
pub use repository::{ApprovalStore, BatchStore, ClientStore, ItemStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
