use chrono::{Duration, Utc};
use payment_orchestrator::domain::intent::{IntentStatus, PaymentIntent};
use payment_orchestrator::store::memory::InMemoryStore;
use payment_orchestrator::store::{IntentFilter, IntentSort, OrchestratorStore};

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let base = Utc::now();
    let rows = [
        ("pi_a", 1000, "INR", IntentStatus::Succeeded, 0),
        ("pi_b", 3000, "INR", IntentStatus::Failed, 1),
        ("pi_c", 2000, "USD", IntentStatus::Succeeded, 2),
        ("pi_d", 4000, "INR", IntentStatus::Created, 3),
    ];
    for (id, amount, currency, status, age) in rows {
        let mut intent = PaymentIntent::new("m1", amount, currency, id);
        intent.id = id.to_string();
        intent.status = status;
        intent.created_at = base - Duration::seconds(age);
        store.insert_intent(&intent).await.unwrap();
    }
    store
}

#[tokio::test]
async fn newest_first_is_the_default_order() {
    let store = seeded_store().await;
    let (items, total) = store
        .list_intents("m1", &IntentFilter::default())
        .await
        .unwrap();
    assert_eq!(total, 4);
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["pi_a", "pi_b", "pi_c", "pi_d"]);
}

#[tokio::test]
async fn amount_sorts_run_both_directions() {
    let store = seeded_store().await;
    let filter = IntentFilter {
        sort: IntentSort::AmountDesc,
        ..IntentFilter::default()
    };
    let (items, _) = store.list_intents("m1", &filter).await.unwrap();
    let amounts: Vec<i64> = items.iter().map(|i| i.amount).collect();
    assert_eq!(amounts, vec![4000, 3000, 2000, 1000]);

    let filter = IntentFilter {
        sort: IntentSort::AmountAsc,
        ..IntentFilter::default()
    };
    let (items, _) = store.list_intents("m1", &filter).await.unwrap();
    let amounts: Vec<i64> = items.iter().map(|i| i.amount).collect();
    assert_eq!(amounts, vec![1000, 2000, 3000, 4000]);
}

#[tokio::test]
async fn status_and_currency_filters_compose() {
    let store = seeded_store().await;
    let filter = IntentFilter {
        status: Some(IntentStatus::Succeeded),
        currency: Some("inr".to_string()),
        ..IntentFilter::default()
    };
    let (items, total) = store.list_intents("m1", &filter).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].id, "pi_a");
}

#[tokio::test]
async fn pages_window_the_result_set() {
    let store = seeded_store().await;
    let filter = IntentFilter {
        limit: 3,
        page: 2,
        ..IntentFilter::default()
    };
    let (items, total) = store.list_intents("m1", &filter).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "pi_d");
}

#[tokio::test]
async fn absurd_page_numbers_return_an_empty_page() {
    let store = seeded_store().await;
    for page in [5, 1_000_000, i64::MAX] {
        let filter = IntentFilter {
            page,
            limit: 10,
            ..IntentFilter::default()
        };
        let (items, total) = store.list_intents("m1", &filter).await.unwrap();
        assert_eq!(total, 4);
        assert!(items.is_empty());
    }
}

#[tokio::test]
async fn stats_aggregate_succeeded_volume_per_gateway() {
    let store = InMemoryStore::new();
    for (id, amount, status, gateway) in [
        ("pi_1", 1000, IntentStatus::Succeeded, Some("alphapay")),
        ("pi_2", 2000, IntentStatus::Succeeded, Some("betapay")),
        ("pi_3", 4000, IntentStatus::Succeeded, Some("alphapay")),
        ("pi_4", 8000, IntentStatus::Failed, Some("alphapay")),
        ("pi_5", 16_000, IntentStatus::Cancelled, None),
    ] {
        let mut intent = PaymentIntent::new("m1", amount, "INR", id);
        intent.id = id.to_string();
        intent.status = status;
        intent.gateway_used = gateway.map(str::to_string);
        store.insert_intent(&intent).await.unwrap();
    }

    let stats = store.intent_stats("m1").await.unwrap();
    assert_eq!(stats.total_all, 5);
    assert_eq!(stats.total_succeeded, 3);
    assert_eq!(stats.total_failed, 1);
    assert_eq!(stats.total_cancelled, 1);
    assert_eq!(stats.total_volume, 7000);
    assert_eq!(stats.gateway_breakdown.get("alphapay"), Some(&5000));
    assert_eq!(stats.gateway_breakdown.get("betapay"), Some(&2000));
}
