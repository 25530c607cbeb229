//! Read-side summaries for operators

use crate::error::{ApprovalError, ApprovalResult, Missing};
use approval_model::{Batch, BatchId, Item, ItemStatus};
use approval_store::{BatchStore, ClientStore, ItemStore};
use serde::{Deserialize, Serialize};

/// Decision counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items in the batch
    pub total: usize,
    /// Items approved
    pub approved: usize,
    /// Items rejected
    pub rejected: usize,
    /// Items not yet decided
    pub pending: usize,
}

impl BatchSummary {
    /// Count decisions over `items`
    #[must_use]
    pub fn from_items(items: &[Item]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            acc.total += 1;
            match item.status {
                ItemStatus::Approved => acc.approved += 1,
                ItemStatus::Rejected => acc.rejected += 1,
                ItemStatus::Pending => acc.pending += 1,
            }
            acc
        })
    }
}

/// Workspace-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Registered clients
    pub total_clients: usize,
    /// Batches of any status
    pub total_batches: usize,
    /// Finalized batches
    pub completed_batches: usize,
    /// Approved items as a rounded percentage of all items
    pub approval_rate: u32,
}

/// Rounded `approved / total` percentage, 0 for no items
#[must_use]
pub fn approval_rate(approved: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // Integer round-half-up of approved * 100 / total.
    let rate = (approved * 200 + total) / (total * 2);
    u32::try_from(rate).unwrap_or(100)
}

/// Decision counts for one batch.
///
/// # Errors
/// - `ApprovalError::NotFound` if the batch is unknown
/// - `ApprovalError::Persistence` if a read fails
pub async fn batch_summary<S>(store: &S, batch_id: BatchId) -> ApprovalResult<BatchSummary>
where
    S: BatchStore + ItemStore,
{
    if store.get_batch(batch_id).await?.is_none() {
        return Err(ApprovalError::NotFound(Missing::Batch(batch_id)));
    }
    let items = store.list_items(batch_id).await?;
    Ok(BatchSummary::from_items(&items))
}

/// Totals across all clients and batches.
///
/// # Errors
/// - `ApprovalError::Persistence` if a read fails
pub async fn dashboard<S>(store: &S) -> ApprovalResult<DashboardStats>
where
    S: ClientStore + BatchStore + ItemStore,
{
    let clients = store.list_clients().await?;
    let batches = store.list_batches().await?;

    let mut items = BatchSummary::default();
    for batch in &batches {
        let summary = BatchSummary::from_items(&store.list_items(batch.id).await?);
        items.total += summary.total;
        items.approved += summary.approved;
    }

    Ok(DashboardStats {
        total_clients: clients.len(),
        total_batches: batches.len(),
        completed_batches: batches.iter().filter(|b| b.is_locked()).count(),
        approval_rate: approval_rate(items.approved, items.total),
    })
}

/// All batches, newest first
///
/// # Errors
/// - `ApprovalError::Persistence` if the read fails
pub async fn list_batches<S: BatchStore>(store: &S) -> ApprovalResult<Vec<Batch>> {
    Ok(store.list_batches().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_rounds_to_nearest() {
        assert_eq!(approval_rate(0, 0), 0);
        assert_eq!(approval_rate(1, 3), 33);
        assert_eq!(approval_rate(2, 3), 67);
        assert_eq!(approval_rate(1, 2), 50);
        assert_eq!(approval_rate(1, 8), 13);
        assert_eq!(approval_rate(5, 5), 100);
    }

    #[test]
    fn summary_counts_each_status() {
        let batch_id = BatchId::new();
        let items = vec![
            Item::new(batch_id, "a", 0).with_status(ItemStatus::Approved),
            Item::new(batch_id, "b", 1).with_status(ItemStatus::Rejected),
            Item::new(batch_id, "c", 2),
            Item::new(batch_id, "d", 3).with_status(ItemStatus::Approved),
        ];

        let summary = BatchSummary::from_items(&items);
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                approved: 2,
                rejected: 1,
                pending: 1,
            }
        );
    }
}
