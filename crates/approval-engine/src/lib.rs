//! Approval Engine
//!
//! Batch approval workflow over an [`approval_store::ApprovalStore`]:
//! - Resolves guest link tokens to batches
//! - Applies reviewer edits and decisions while a batch is open
//! - Finalizes a batch: commits every item, then locks the batch
//! - Registers clients and creates batches with fresh link tokens
//! - Summarizes decisions per batch and across the workspace
//!
//! # Example
//!
//! ```rust
//! use approval_engine::prelude::*;
//! use approval_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ApprovalEngine::new(Arc::new(MemoryStore::new()));
//! let client = engine.intake().register_client("Acme", "ops@acme.example").await?;
//! let created = engine
//!     .intake()
//!     .create_batch(NewBatch::new(client.id, "Spring", vec!["a.jpg".into()]))
//!     .await?;
//!
//! let guest = engine.guest(&created.batch.link_token).await?;
//! guest.apply_item_status(created.items[0].id, ItemStatus::Approved).await?;
//! let batch = guest.finalize().await?;
//! assert!(batch.is_locked());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod intake;
pub mod link;
pub mod simulation;
pub mod summary;
pub mod transition;

pub use config::{ConfigError, EngineConfig, LinkConfig};
pub use engine::{ApprovalEngine, GuestReview, ReviewSession};
pub use error::{ApprovalError, ApprovalResult, ErrorKind, FinalizeStage, Missing};
pub use finalize::{FinalizeCoordinator, FinalizeOutcome};
pub use intake::{CreatedBatch, Intake, LinkIssuer, NewBatch, RandomLinkIssuer};
pub use link::LinkResolver;
pub use simulation::{SimulationConfig, SimulationReport, Violation};
pub use summary::{BatchSummary, DashboardStats};
pub use transition::TransitionEngine;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        ApprovalEngine, ApprovalError, ApprovalResult, EngineConfig, ErrorKind, GuestReview,
        NewBatch, ReviewSession,
    };
    pub use approval_model::{Batch, BatchStatus, Item, ItemEdit, ItemStatus, LinkToken};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
