use payment_orchestrator::error::OrchestratorError;
use payment_orchestrator::service::idempotency::IdempotencyLayer;
use payment_orchestrator::store::memory::InMemoryStore;
use payment_orchestrator::store::{MerchantRecord, OrchestratorStore};
use std::collections::HashSet;
use std::sync::Arc;

fn merchant() -> MerchantRecord {
    MerchantRecord {
        id: "m1".to_string(),
        name: "Test Merchant".to_string(),
        api_key_hash: "hash".to_string(),
        webhook_url: None,
        webhook_secret: "whsec_test".to_string(),
        is_disabled: false,
    }
}

#[tokio::test]
async fn same_key_and_payload_returns_the_same_intent() {
    let store = InMemoryStore::new();
    store.add_merchant(merchant()).await;
    let layer = IdempotencyLayer::new(Arc::new(store));

    let first = layer.begin("m1", "key-1", 5000, "INR").await.unwrap();
    assert!(first.created);

    let second = layer.begin("m1", "key-1", 5000, "INR").await.unwrap();
    assert!(!second.created);
    assert_eq!(second.intent.id, first.intent.id);
}

#[tokio::test]
async fn same_key_with_different_payload_conflicts() {
    let store = InMemoryStore::new();
    store.add_merchant(merchant()).await;
    let layer = IdempotencyLayer::new(Arc::new(store));

    layer.begin("m1", "key-1", 5000, "INR").await.unwrap();

    let err = layer.begin("m1", "key-1", 6000, "INR").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict));
    let err = layer.begin("m1", "key-1", 5000, "USD").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict));
}

#[tokio::test]
async fn same_key_for_different_merchants_creates_separate_intents() {
    let store = InMemoryStore::new();
    let layer = IdempotencyLayer::new(Arc::new(store));

    let a = layer.begin("m1", "key-1", 5000, "INR").await.unwrap();
    let b = layer.begin("m2", "key-1", 5000, "INR").await.unwrap();
    assert!(a.created);
    assert!(b.created);
    assert_ne!(a.intent.id, b.intent.id);
}

#[tokio::test]
async fn concurrent_identical_creates_collapse_to_one_intent() {
    let store = InMemoryStore::new();
    store.add_merchant(merchant()).await;
    let store = Arc::new(store);
    let layer = IdempotencyLayer::new(store.clone());

    let mut handles = Vec::new();
    for _ in 0..20 {
        let layer = layer.clone();
        handles.push(tokio::spawn(async move {
            layer.begin("m1", "key-1", 5000, "INR").await
        }));
    }

    let mut ids = HashSet::new();
    let mut created_count = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        ids.insert(outcome.intent.id.clone());
        if outcome.created {
            created_count += 1;
        }
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(created_count, 1);

    let id = ids.into_iter().next().unwrap();
    assert!(store.intent(&id).await.unwrap().is_some());
}
