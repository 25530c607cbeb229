use approval_engine::{
    ApprovalEngine, ApprovalError, ConfigError, DashboardStats, EngineConfig, Missing, NewBatch,
};
use approval_model::{BatchId, ItemStatus};
use approval_store::MemoryStore;
use approval_test_utils::{asset_refs, setup_batch, test_store};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_created_batch_resolves_through_its_link() {
    let fx = setup_batch(3).await;

    let batch = fx.engine.resolve_link(&fx.batch.link_token).await.unwrap();
    assert_eq!(batch, fx.batch);

    let session = fx.guest().await.review().await.unwrap();
    assert_eq!(session.client_name.as_deref(), Some("Test Client"));
    assert_eq!(session.items.len(), 3);
    assert!(session.items.iter().all(|i| i.status == ItemStatus::Pending));
}

#[tokio::test]
async fn test_each_batch_gets_its_own_token() {
    let engine = ApprovalEngine::new(Arc::new(MemoryStore::new()));
    let client = engine
        .intake()
        .register_client("Acme", "ops@acme.example")
        .await
        .unwrap();

    let mut tokens = Vec::new();
    for n in 0..5 {
        let created = engine
            .intake()
            .create_batch(NewBatch::new(client.id, format!("Batch {n}"), asset_refs(1)))
            .await
            .unwrap();
        tokens.push(created.batch.link_token.as_str().to_string());
    }
    tokens.sort();
    tokens.dedup();
    assert_eq!(tokens.len(), 5);
}

#[tokio::test]
async fn test_configured_token_length_is_used() {
    let engine =
        ApprovalEngine::with_config(test_store(), EngineConfig::new().with_token_length(16)).unwrap();
    let client = engine
        .intake()
        .register_client("Acme", "ops@acme.example")
        .await
        .unwrap();

    let created = engine
        .intake()
        .create_batch(NewBatch::new(client.id, "Long", asset_refs(2)))
        .await
        .unwrap();
    assert_eq!(created.batch.link_token.as_str().len(), 16);
}

#[test]
fn test_engine_refuses_unusable_link_settings() {
    for config in [
        EngineConfig::new().with_token_length(0),
        EngineConfig::new().with_max_issue_attempts(0),
        EngineConfig::new().with_max_assets(0),
    ] {
        let err = ApprovalEngine::with_config(test_store(), config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

#[tokio::test]
async fn test_batch_detail_for_operator() {
    let fx = setup_batch(3).await;
    fx.annotate(2, "REF-3", "colour cast").await;

    let detail = fx.engine.batch_detail(fx.batch.id).await.unwrap();
    assert_eq!(detail.batch, fx.batch);
    assert_eq!(detail.client_name.as_deref(), Some("Test Client"));
    assert_eq!(detail.items, fx.stored_items().await);
    assert!(!detail.locked);

    fx.engine.finalize(fx.batch.id).await.unwrap();
    assert!(fx.engine.batch_detail(fx.batch.id).await.unwrap().locked);

    let missing = BatchId::new();
    let err = fx.engine.batch_detail(missing).await.unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(Missing::Batch(id)) if id == missing));
}

#[tokio::test]
async fn test_dashboard_counts_and_rate() {
    let fx = setup_batch(3).await;
    let ids: Vec<_> = fx.items.iter().map(|i| i.id).collect();
    fx.engine
        .apply_item_status(fx.batch.id, ids[0], ItemStatus::Approved)
        .await
        .unwrap();
    fx.engine
        .apply_item_status(fx.batch.id, ids[1], ItemStatus::Approved)
        .await
        .unwrap();
    fx.engine
        .apply_item_status(fx.batch.id, ids[2], ItemStatus::Rejected)
        .await
        .unwrap();
    fx.engine.finalize(fx.batch.id).await.unwrap();

    fx.engine
        .intake()
        .create_batch(NewBatch::new(fx.client.id, "Second", asset_refs(1)))
        .await
        .unwrap();

    let stats = fx.engine.dashboard().await.unwrap();
    assert_eq!(
        stats,
        DashboardStats {
            total_clients: 1,
            total_batches: 2,
            completed_batches: 1,
            approval_rate: 50,
        }
    );

    let batches = fx.engine.list_batches().await.unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].name, "Second");
    assert!(batches[1].is_locked());
}

#[tokio::test]
async fn test_summary_of_unknown_batch_is_not_found() {
    let fx = setup_batch(1).await;
    let missing = BatchId::new();

    let err = fx.engine.batch_summary(missing).await.unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(Missing::Batch(id)) if id == missing));
}

#[tokio::test]
async fn test_empty_workspace_dashboard() {
    let engine = ApprovalEngine::new(Arc::new(MemoryStore::new()));
    assert_eq!(engine.dashboard().await.unwrap(), DashboardStats::default());
}
