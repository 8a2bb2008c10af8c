//! Tests for the health checker.

use super::*;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_checker(store: Arc<KvStore>) -> HealthChecker {
    HealthChecker::new(store, HealthCheckConfig::default())
}

async fn mock_upstream(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_successful_probe_writes_healthy_record() {
    let server = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let checker = make_checker(store.clone());

    let record = checker.check_url(&server.uri()).await.unwrap();
    assert!(record.healthy);
    assert_eq!(record.fail_count, 0);

    // The record is durable and readable back.
    let stored = checker.record(&server.uri()).unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_null_result_counts_as_success() {
    let server = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": null})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let record = make_checker(store).check_url(&server.uri()).await.unwrap();
    assert!(record.healthy);
}

#[tokio::test]
async fn test_missing_result_field_is_failure() {
    let server = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let record = make_checker(store).check_url(&server.uri()).await.unwrap();
    assert!(!record.healthy);
    assert_eq!(record.fail_count, 1);
}

#[tokio::test]
async fn test_non_200_is_failure() {
    let server = mock_upstream(
        ResponseTemplate::new(500).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let record = make_checker(store).check_url(&server.uri()).await.unwrap();
    assert!(!record.healthy);
}

#[tokio::test]
async fn test_consecutive_failures_accumulate() {
    // Nothing listens on port 1; the connection is refused immediately.
    let url = "http://127.0.0.1:1";
    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let checker = make_checker(store);

    let first = checker.check_url(url).await.unwrap();
    assert_eq!(first.fail_count, 1);

    let second = checker.check_url(url).await.unwrap();
    assert_eq!(second.fail_count, 2);
    assert!(!second.healthy);
}

#[tokio::test]
async fn test_success_resets_fail_count() {
    let server = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let checker = make_checker(store.clone());

    // Seed a failing history for the same URL.
    let stale = HealthRecord {
        url: server.uri(),
        healthy: false,
        last_check: Utc::now(),
        response_time: 400,
        fail_count: 2,
    };
    store
        .hash_set(
            HEALTH_HASH,
            &server.uri(),
            &serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

    let record = checker.check_url(&server.uri()).await.unwrap();
    assert!(record.healthy);
    assert_eq!(record.fail_count, 0);
}

#[tokio::test]
async fn test_corrupt_record_reads_as_absent_and_restarts_at_one() {
    let url = "http://127.0.0.1:1";
    let store = Arc::new(KvStore::open_in_memory().unwrap());
    store.hash_set(HEALTH_HASH, url, "not json").unwrap();

    let checker = make_checker(store);
    assert!(checker.record(url).unwrap().is_none());

    let record = checker.check_url(url).await.unwrap();
    assert_eq!(record.fail_count, 1);
}

#[tokio::test]
async fn test_check_all_probes_every_known_url() {
    let a = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "1"})),
    )
    .await;
    let b = mock_upstream(
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1})),
    )
    .await;

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let checker = make_checker(store.clone());

    // First contact creates the records the scheduler will pick up.
    checker.check_url(&a.uri()).await.unwrap();
    checker.check_url(&b.uri()).await.unwrap();

    assert_eq!(checker.check_all().await, 2);
    assert!(checker.record(&a.uri()).unwrap().unwrap().healthy);
    assert!(!checker.record(&b.uri()).unwrap().unwrap().healthy);
}

#[tokio::test]
async fn test_checker_stops_on_cancel() {
    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let checker = Arc::new(make_checker(store));

    let cancel = CancellationToken::new();
    let handle = checker.start(cancel.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(result.is_ok());
}
