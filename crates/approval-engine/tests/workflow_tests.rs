use approval_engine::{ApprovalError, ErrorKind, FinalizeStage, Missing};
use approval_model::{BatchStatus, ItemEdit, ItemStatus, LinkToken, ValidationError};
use approval_store::{BatchStore, FaultPlan, ItemStore};
use approval_test_utils::setup_batch;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_same_status_twice_is_idempotent() {
    let fx = setup_batch(2).await;
    let item = &fx.items[0];

    let first = fx
        .engine
        .apply_item_status(fx.batch.id, item.id, ItemStatus::Approved)
        .await
        .unwrap();
    let after_first = fx.stored_items().await;

    let second = fx
        .engine
        .apply_item_status(fx.batch.id, item.id, ItemStatus::Approved)
        .await
        .unwrap();
    let after_second = fx.stored_items().await;

    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_mutations_after_finalize_are_locked() {
    let fx = setup_batch(3).await;
    fx.engine.finalize(fx.batch.id).await.unwrap();

    for item in &fx.items {
        for status in [ItemStatus::Approved, ItemStatus::Rejected, ItemStatus::Pending] {
            let err = fx
                .engine
                .apply_item_status(fx.batch.id, item.id, status)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BatchLocked);
        }
        let err = fx
            .engine
            .apply_item_edit(fx.batch.id, item.id, &ItemEdit::new().label("late"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BatchLocked);
    }
}

#[tokio::test]
async fn test_finalize_twice_returns_same_batch_without_writes() {
    let fx = setup_batch(4).await;
    fx.annotate(1, "REF-1", "sharp").await;

    let first = fx.engine.finalize(fx.batch.id).await.unwrap();
    let items_after_first = fx.stored_items().await;
    let writes = fx.store.stats().annotation_writes;

    let second = fx.engine.finalize(fx.batch.id).await.unwrap();
    let third = fx.engine.finalize(fx.batch.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(fx.store.stats().annotation_writes, writes);
    assert_eq!(fx.stored_items().await, items_after_first);
}

#[tokio::test]
async fn test_sweep_failure_keeps_batch_open_and_retry_completes() {
    let fx = setup_batch(2).await;
    let (a, b) = (&fx.items[0], &fx.items[1]);
    fx.annotate(0, "A-REF", "keep").await;
    fx.annotate(1, "B-REF", "retry me").await;

    fx.store.set_plan(FaultPlan::none().fail_annotations_for(b.id));
    let err = fx.engine.finalize(fx.batch.id).await.unwrap_err();

    assert!(matches!(
        err,
        ApprovalError::FinalizeIncomplete {
            stage: FinalizeStage::ItemSweep { committed: 1, total: 2 },
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);

    let batch = fx.store.get_batch(fx.batch.id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Open);
    let committed_a = fx.store.get_item(a.id).await.unwrap().unwrap();
    assert_eq!(committed_a.label.as_deref(), Some("A-REF"));
    assert_eq!(committed_a.observation.as_deref(), Some("keep"));

    fx.store.heal();
    let batch = fx.engine.finalize(fx.batch.id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert!(batch.completed_at.is_some());

    let final_a = fx.store.get_item(a.id).await.unwrap().unwrap();
    assert_eq!(final_a.label, committed_a.label);
    assert_eq!(final_a.observation, committed_a.observation);
    assert_eq!(final_a.status, committed_a.status);
    let final_b = fx.store.get_item(b.id).await.unwrap().unwrap();
    assert_eq!(final_b.label.as_deref(), Some("B-REF"));
}

#[tokio::test]
async fn test_scheduled_sweep_failure_reports_progress() {
    let fx = setup_batch(5).await;
    let before = fx.store.stats().annotation_writes;
    fx.store
        .set_plan(FaultPlan::none().fail_annotation_call(before + 3));

    let err = fx.engine.finalize(fx.batch.id).await.unwrap_err();
    assert!(matches!(
        err,
        ApprovalError::FinalizeIncomplete {
            stage: FinalizeStage::ItemSweep { committed: 3, total: 5 },
            ..
        }
    ));

    let batch = fx.engine.finalize(fx.batch.id).await.unwrap();
    assert!(batch.is_locked());
}

#[tokio::test]
async fn test_review_scenario_approve_reject_finalize() {
    let fx = setup_batch(2).await;
    let guest = fx.guest().await;
    let (one, two) = (fx.items[0].id, fx.items[1].id);

    let item = guest.apply_item_status(one, ItemStatus::Approved).await.unwrap();
    assert_eq!(item.status, ItemStatus::Approved);
    let item = guest.apply_item_status(two, ItemStatus::Rejected).await.unwrap();
    assert_eq!(item.status, ItemStatus::Rejected);

    let batch = guest.finalize().await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);

    let items = fx.stored_items().await;
    assert_eq!(items[0].status, ItemStatus::Approved);
    assert_eq!(items[1].status, ItemStatus::Rejected);

    let err = guest.apply_item_status(one, ItemStatus::Pending).await.unwrap_err();
    assert!(matches!(err, ApprovalError::BatchLocked(id) if id == fx.batch.id));
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let fx = setup_batch(1).await;

    let err = fx
        .engine
        .resolve_link(&LinkToken::new("unknown-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(Missing::Link)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.is_retryable());

    assert!(fx.engine.guest(&LinkToken::new("")).await.is_err());
}

#[tokio::test]
async fn test_pending_target_fails_whatever_the_current_status() {
    let fx = setup_batch(3).await;
    fx.engine
        .apply_item_status(fx.batch.id, fx.items[1].id, ItemStatus::Approved)
        .await
        .unwrap();
    fx.engine
        .apply_item_status(fx.batch.id, fx.items[2].id, ItemStatus::Rejected)
        .await
        .unwrap();
    let writes = fx.store.stats().item_writes;

    for item in &fx.items {
        let err = fx
            .engine
            .apply_item_status(fx.batch.id, item.id, ItemStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert!(matches!(err, ApprovalError::Validation(ValidationError::PendingTarget)));
    }
    assert_eq!(fx.store.stats().item_writes, writes);
}

#[tokio::test]
async fn test_failed_item_write_is_surfaced_and_retryable() {
    let fx = setup_batch(1).await;
    fx.store.set_plan(FaultPlan::none().fail_put_item(1));

    let err = fx
        .engine
        .apply_item_status(fx.batch.id, fx.items[0].id, ItemStatus::Approved)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(err.is_retryable());
    assert_eq!(fx.stored_items().await[0].status, ItemStatus::Pending);

    let item = fx
        .engine
        .apply_item_status(fx.batch.id, fx.items[0].id, ItemStatus::Approved)
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Approved);
}

#[tokio::test]
async fn test_empty_annotation_clears_field() {
    let fx = setup_batch(1).await;
    fx.annotate(0, "REF", "note").await;

    let item = fx
        .engine
        .apply_item_edit(fx.batch.id, fx.items[0].id, &ItemEdit::new().label(""))
        .await
        .unwrap();
    assert_eq!(item.label, None);
    assert_eq!(item.observation.as_deref(), Some("note"));
}

#[tokio::test]
async fn test_concurrent_reviewers_on_one_link() {
    let fx = setup_batch(6).await;
    let guest = fx.guest().await;

    let calls = fx.items.iter().enumerate().map(|(n, item)| {
        let guest = guest.clone();
        let status = if n % 2 == 0 {
            ItemStatus::Approved
        } else {
            ItemStatus::Rejected
        };
        let id = item.id;
        async move { guest.apply_item_status(id, status).await }
    });
    for result in futures::future::join_all(calls).await {
        result.unwrap();
    }

    let summary = fx.engine.batch_summary(fx.batch.id).await.unwrap();
    assert_eq!(summary.approved, 3);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.pending, 0);
}
