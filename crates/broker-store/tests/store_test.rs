//! Expiring store behavior over the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use broker_core::config::BrokerConfig;
use broker_core::config::store::StoreConfig;
use broker_core::error::ErrorKind;
use broker_store::{BackendRegistry, ExpiringStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ticket {
    principal: String,
    service: String,
}

fn store_config(max: i64, expire_seconds: u64, interval_seconds: u64) -> StoreConfig {
    let config = BrokerConfig::from_toml(&format!(
        r#"
        [[stores]]
        id = "tickets"
        max = {max}
        expire_seconds = {expire_seconds}
        interval_seconds = {interval_seconds}

        [stores.handler]
        id = "ticket-memory"
        class = "memory"
        "#
    ))
    .unwrap();
    config.stores.into_iter().next().unwrap()
}

async fn memory_store(max: i64, expire_seconds: u64) -> ExpiringStore {
    ExpiringStore::init(
        &store_config(max, expire_seconds, 60),
        &BackendRegistry::with_builtins(),
        None,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_create_is_exclusive() {
    let store = memory_store(-1, 0).await;

    assert!(store.create("ST-1", json!("alice")).await.unwrap());
    assert!(!store.create("ST-1", json!("mallory")).await.unwrap());
    assert_eq!(store.get("ST-1").await.unwrap(), Some(json!("alice")));

    store.destroy().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_has_one_winner() {
    let store = Arc::new(memory_store(-1, 0).await);

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create("artifact", json!(n)).await.unwrap() })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.get_count().await.unwrap(), 1);

    store.destroy().await;
}

#[tokio::test]
async fn test_capacity_rejects_writes_at_max() {
    let store = memory_store(2, 0).await;

    store.put("a", json!(1)).await.unwrap();
    store.put("b", json!(2)).await.unwrap();

    let err = store.put("c", json!(3)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapacityExceeded);
    let err = store.create("d", json!(4)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapacityExceeded);
    assert_eq!(store.get_count().await.unwrap(), 2);

    assert!(store.remove("a").await.unwrap());
    assert!(store.create("c", json!(3)).await.unwrap());
    assert_eq!(store.get("c").await.unwrap(), Some(json!(3)));
    assert_eq!(store.get_count().await.unwrap(), 2);

    store.destroy().await;
}

#[tokio::test]
async fn test_unlimited_store_accepts_many_entries() {
    let store = memory_store(-1, 0).await;
    for n in 0..10_000 {
        assert!(store.create(&format!("k{n}"), json!(n)).await.unwrap());
    }
    assert_eq!(store.get_count().await.unwrap(), 10_000);
    store.destroy().await;
}

#[tokio::test]
async fn test_expired_entries_are_swept() {
    let store = ExpiringStore::init(
        &store_config(-1, 1, 1),
        &BackendRegistry::with_builtins(),
        None,
    )
    .await
    .unwrap();
    assert!(store.is_cleaning());

    store.put("session", json!({"user": "bob"})).await.unwrap();
    assert!(store.contains_key("session").await.unwrap());

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!store.contains_key("session").await.unwrap());
    assert_eq!(store.get("session").await.unwrap(), None);

    store.put("fresh", json!({"user": "carol"})).await.unwrap();
    assert_eq!(
        store.get("fresh").await.unwrap(),
        Some(json!({"user": "carol"}))
    );

    store.destroy().await;
}

#[tokio::test]
async fn test_update_creates_missing_entry() {
    let store = memory_store(-1, 0).await;

    store.update("missing", json!("v1")).await.unwrap();
    assert_eq!(store.get("missing").await.unwrap(), Some(json!("v1")));

    let first = store.get_timestamp("missing").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.update("missing", json!("v2")).await.unwrap();
    let second = store.get_timestamp("missing").await.unwrap().unwrap();
    assert!(second > first);
    assert_eq!(store.get("missing").await.unwrap(), Some(json!("v2")));

    store.destroy().await;
}

#[tokio::test]
async fn test_typed_round_trip() {
    let store = memory_store(-1, 0).await;
    let ticket = Ticket {
        principal: "alice".to_string(),
        service: "https://app.example.org".to_string(),
    };

    assert!(store.create_as("ST-42", &ticket).await.unwrap());
    assert_eq!(store.get_as::<Ticket>("ST-42").await.unwrap(), Some(ticket));
    assert_eq!(store.get_as::<Ticket>("ST-43").await.unwrap(), None);

    store.put("broken", json!(7)).await.unwrap();
    let err = store.get_as::<Ticket>("broken").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Serialization);

    store.destroy().await;
}

#[tokio::test]
async fn test_expiration_disabled_without_expiry() {
    let store = memory_store(-1, 0).await;
    assert!(!store.is_cleaning());
    store.put("k", json!(true)).await.unwrap();
    assert_eq!(store.get_expiration_time("k").await.unwrap(), None);
    store.destroy().await;
}

#[tokio::test]
async fn test_get_all_and_remove_all() {
    let store = memory_store(-1, 0).await;
    store.put("a", json!(1)).await.unwrap();
    store.put("b", json!(2)).await.unwrap();

    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["b"], json!(2));

    store.remove_all().await.unwrap();
    assert_eq!(store.get_count().await.unwrap(), 0);
    assert!(!store.remove("a").await.unwrap());

    store.destroy().await;
}

#[tokio::test]
async fn test_destroy_is_idempotent_and_final() {
    let store = ExpiringStore::init(
        &store_config(-1, 30, 5),
        &BackendRegistry::with_builtins(),
        None,
    )
    .await
    .unwrap();

    store.destroy().await;
    store.destroy().await;
    assert!(store.is_destroyed());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!store.is_cleaning());

    let err = store.get("k").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    let err = store.put("k", json!(1)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_reload_replaces_backend_and_limits() {
    let store = memory_store(-1, 0).await;
    store.put("old", json!("x")).await.unwrap();

    let registry = BackendRegistry::with_builtins();
    store
        .reload(&store_config(5, 120, 10), &registry, None)
        .await
        .unwrap();

    assert_eq!(store.get("old").await.unwrap(), None);
    assert_eq!(store.max_entries().unwrap(), 5);
    assert_eq!(
        store.expire_after().unwrap(),
        Some(chrono::Duration::seconds(120))
    );
    assert!(store.is_cleaning());

    let mut renamed = store_config(5, 120, 10);
    renamed.id = "sessions".to_string();
    let err = store.reload(&renamed, &registry, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);
    assert!(!store.is_destroyed());

    store.destroy().await;
}

#[tokio::test]
async fn test_custom_backend_registration() {
    let mut registry = BackendRegistry::new();
    registry.register("volatile", |_ctx| async move {
        Ok(Arc::new(broker_store::memory::MemoryBackend::new())
            as Arc<dyn broker_core::traits::StorageBackend>)
    });

    let mut config = store_config(-1, 0, 60);
    config.handler.class = "volatile".to_string();
    let store = ExpiringStore::init(&config, &registry, None).await.unwrap();
    store.put("k", json!(1)).await.unwrap();
    assert_eq!(store.get_count().await.unwrap(), 1);
    store.destroy().await;

    config.handler.class = "memory".to_string();
    let err = ExpiringStore::init(&config, &registry, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);
}
