//! Approval simulator
//!
//! Drives one batch through a full review under concurrency and injected
//! store faults, then checks the workflow invariants:
//! - finalize eventually succeeds once faults stop
//! - a finalized batch rejects every later mutation with `BatchLocked`
//! - no item a reviewer decided is left `pending`
//! - finalizing again writes nothing
//!
//! Violations are collected into the report, never panicked on.

use crate::config::EngineConfig;
use crate::engine::{ApprovalEngine, GuestReview};
use crate::error::ApprovalError;
use crate::intake::NewBatch;
use approval_model::{BatchStatus, ItemEdit, ItemId, ItemStatus};
use approval_store::{BatchStore, FaultPlan, FaultyStore, ItemStore, MemoryStore};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

type SimStore = FaultyStore<MemoryStore>;

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Concurrent reviewers sharing the link
    pub reviewers: u32,
    /// Items in the batch
    pub items: u32,
    /// Actions each reviewer performs before finalize
    pub actions_per_reviewer: u32,
    /// Probability that any store write fails
    pub write_failure_rate: f64,
    /// Finalize attempts under faults before the store is healed
    pub max_finalize_attempts: u32,
    /// Engine settings
    pub engine: EngineConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            reviewers: 4,
            items: 12,
            actions_per_reviewer: 25,
            write_failure_rate: 0.1,
            max_finalize_attempts: 10,
            engine: EngineConfig::default(),
        }
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Violation {
    /// Client or batch could not be created
    SetupFailed(String),
    /// A reviewer call failed with a non-retryable error
    UnexpectedError {
        /// Reviewer index
        reviewer: u32,
        /// Rendered error
        error: String,
    },
    /// A reviewer task panicked
    ReviewerPanicked(u32),
    /// Finalize failed even after the store was healed
    FinalizeNeverSucceeded {
        /// Calls made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },
    /// Batch row is not completed after a successful finalize
    BatchNotCompleted,
    /// A mutation after finalize was not refused with `BatchLocked`
    MutationAfterFinalize {
        /// Item addressed
        item_id: ItemId,
        /// What happened instead
        outcome: String,
    },
    /// A decided item ended up `pending`
    DecidedItemPending(ItemId),
    /// Finalizing a completed batch wrote annotations
    RefinalizeWrote(usize),
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStats {
    /// Annotation edits accepted
    pub edits_applied: u64,
    /// Decisions accepted
    pub decisions_applied: u64,
    /// Reviewer calls failed by injected faults
    pub transient_failures: u64,
    /// Finalize calls made, the successful one included
    pub finalize_attempts: u32,
    /// Store was healed to let finalize through
    pub healed_for_finalize: bool,
    /// Faults injected by the store
    pub injected_failures: usize,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Configuration used
    pub config: SimulationConfig,
    /// Counters
    pub stats: SimulationStats,
    /// Invariant violations
    pub violations: Vec<Violation>,
}

impl SimulationReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Approval Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!(
            "Reviewers: {} x {} actions over {} items\n",
            self.config.reviewers, self.config.actions_per_reviewer, self.config.items
        ));
        report.push_str(&format!("Write Failure Rate: {:.2}\n", self.config.write_failure_rate));
        report.push_str(&format!("Edits Applied: {}\n", self.stats.edits_applied));
        report.push_str(&format!("Decisions Applied: {}\n", self.stats.decisions_applied));
        report.push_str(&format!("Transient Failures: {}\n", self.stats.transient_failures));
        report.push_str(&format!("Injected Failures: {}\n", self.stats.injected_failures));
        report.push_str(&format!("Finalize Attempts: {}\n", self.stats.finalize_attempts));
        if self.stats.healed_for_finalize {
            report.push_str("Store healed before final finalize attempt\n");
        }
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

#[derive(Debug, Default)]
struct ReviewerLog {
    edits: u64,
    decisions: u64,
    transient: u64,
    decided: HashSet<ItemId>,
    unexpected: Vec<String>,
}

/// Run the approval simulator
pub async fn run(config: SimulationConfig) -> SimulationReport {
    let store = Arc::new(FaultyStore::with_seed(MemoryStore::new(), config.seed));
    let mut stats = SimulationStats::default();
    let mut violations = Vec::new();

    let engine = match ApprovalEngine::with_config(Arc::clone(&store), config.engine.clone()) {
        Ok(engine) => engine,
        Err(err) => {
            violations.push(Violation::SetupFailed(err.to_string()));
            return SimulationReport {
                config,
                stats,
                violations,
            };
        }
    };

    let created = match setup(&engine, config.items).await {
        Ok(created) => created,
        Err(err) => {
            violations.push(Violation::SetupFailed(err.to_string()));
            return SimulationReport {
                config,
                stats,
                violations,
            };
        }
    };
    let batch_id = created.batch.id;
    let item_ids: Arc<Vec<ItemId>> = Arc::new(created.items.iter().map(|i| i.id).collect());

    let guest = match engine.guest(&created.batch.link_token).await {
        Ok(guest) => guest,
        Err(err) => {
            violations.push(Violation::SetupFailed(err.to_string()));
            return SimulationReport {
                config,
                stats,
                violations,
            };
        }
    };

    tracing::info!(
        seed = config.seed,
        reviewers = config.reviewers,
        items = config.items,
        "simulation started"
    );
    store.set_plan(FaultPlan::none().with_write_failure_rate(config.write_failure_rate));

    // Phase 1: concurrent reviewers
    let handles = (0..config.reviewers).map(|reviewer| {
        let guest = guest.clone();
        let item_ids = Arc::clone(&item_ids);
        let seed = config.seed.wrapping_add(u64::from(reviewer) + 1);
        let actions = config.actions_per_reviewer;
        tokio::spawn(async move { review(guest, &item_ids, seed, actions).await })
    });

    let mut decided = HashSet::new();
    for (reviewer, joined) in (0u32..).zip(futures::future::join_all(handles).await) {
        match joined {
            Ok(log) => {
                stats.edits_applied += log.edits;
                stats.decisions_applied += log.decisions;
                stats.transient_failures += log.transient;
                decided.extend(log.decided);
                violations.extend(
                    log.unexpected
                        .into_iter()
                        .map(|error| Violation::UnexpectedError { reviewer, error }),
                );
            }
            Err(_) => violations.push(Violation::ReviewerPanicked(reviewer)),
        }
    }

    // Phase 2: finalize under faults, then healed
    let mut last_error = None;
    let mut finalized = false;
    while stats.finalize_attempts < config.max_finalize_attempts {
        stats.finalize_attempts += 1;
        match engine.finalize(batch_id).await {
            Ok(_) => {
                finalized = true;
                break;
            }
            Err(err) => {
                tracing::debug!(attempt = stats.finalize_attempts, error = %err, "finalize retry");
                last_error = Some(err);
            }
        }
    }
    stats.injected_failures = store.stats().injected_failures;
    store.heal();

    if !finalized {
        stats.healed_for_finalize = true;
        stats.finalize_attempts += 1;
        if let Err(err) = engine.finalize(batch_id).await {
            last_error = Some(err);
        } else {
            finalized = true;
        }
    }

    if !finalized {
        violations.push(Violation::FinalizeNeverSucceeded {
            attempts: stats.finalize_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        });
        return SimulationReport {
            config,
            stats,
            violations,
        };
    }

    // Phase 3: invariants on the finalized batch
    violations.extend(check_finalized(&store, &guest, &item_ids, &decided).await);

    tracing::info!(violations = violations.len(), "simulation finished");
    SimulationReport {
        config,
        stats,
        violations,
    }
}

async fn setup(
    engine: &ApprovalEngine<SimStore>,
    items: u32,
) -> Result<crate::intake::CreatedBatch, ApprovalError> {
    let client = engine
        .intake()
        .register_client("Simulated Client", "sim@approval.test")
        .await?;
    let assets = (0..items).map(|n| format!("asset://sim/{n}")).collect();
    engine
        .intake()
        .create_batch(NewBatch::new(client.id, "Simulated batch", assets))
        .await
}

async fn review(
    guest: GuestReview<SimStore>,
    item_ids: &[ItemId],
    seed: u64,
    actions: u32,
) -> ReviewerLog {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut log = ReviewerLog::default();
    if item_ids.is_empty() {
        return log;
    }

    for action in 0..actions {
        let item_id = item_ids[rng.random_range(0..item_ids.len())];
        let result = if rng.random_bool(0.5) {
            let edit = if rng.random_bool(0.2) {
                ItemEdit::new().label("")
            } else {
                ItemEdit::new()
                    .label(format!("REF-{seed}-{action}"))
                    .observation(format!("note {action}"))
            };
            guest.apply_item_edit(item_id, &edit).await.map(|_| {
                log.edits += 1;
            })
        } else {
            let status = if rng.random_bool(0.5) {
                ItemStatus::Approved
            } else {
                ItemStatus::Rejected
            };
            guest.apply_item_status(item_id, status).await.map(|_| {
                log.decisions += 1;
                log.decided.insert(item_id);
            })
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_retryable() => log.transient += 1,
            Err(err) => log.unexpected.push(err.to_string()),
        }
        tokio::task::yield_now().await;
    }
    log
}

async fn check_finalized(
    store: &SimStore,
    guest: &GuestReview<SimStore>,
    item_ids: &[ItemId],
    decided: &HashSet<ItemId>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let batch_id = guest.batch_id();

    match store.get_batch(batch_id).await {
        Ok(Some(batch)) if batch.status == BatchStatus::Completed => {}
        _ => violations.push(Violation::BatchNotCompleted),
    }

    for &item_id in item_ids {
        let attempts = [
            guest.apply_item_status(item_id, ItemStatus::Approved).await,
            guest
                .apply_item_edit(item_id, &ItemEdit::new().observation("too late"))
                .await,
        ];
        for attempt in attempts {
            match attempt {
                Err(err) if err.is_locked() => {}
                other => violations.push(Violation::MutationAfterFinalize {
                    item_id,
                    outcome: format!("{other:?}"),
                }),
            }
        }
    }

    match store.list_items(batch_id).await {
        Ok(items) => violations.extend(
            items
                .iter()
                .filter(|item| decided.contains(&item.id) && item.status == ItemStatus::Pending)
                .map(|item| Violation::DecidedItemPending(item.id)),
        ),
        Err(err) => violations.push(Violation::SetupFailed(err.to_string())),
    }

    let writes_before = store.stats().annotation_writes;
    match guest.finalize().await {
        Ok(_) => {
            let written = store.stats().annotation_writes - writes_before;
            if written > 0 {
                violations.push(Violation::RefinalizeWrote(written));
            }
        }
        Err(err) => violations.push(Violation::FinalizeNeverSucceeded {
            attempts: 1,
            last_error: err.to_string(),
        }),
    }

    violations
}
