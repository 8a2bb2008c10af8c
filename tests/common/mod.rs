//! Shared test utilities for Conduit integration tests.
//!
//! Provides builders for a fully wired application (store, registry,
//! selector, sessions, executor, router) plus helpers for seeding state
//! and driving the router in-process.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use conduit::api::{create_router, AppState};
use conduit::chains::{chain_key, ChainConfig, ChainRegistry, ChainsConfig};
use conduit::config::ConduitConfig;
use conduit::executor::Executor;
use conduit::health::{HealthCheckConfig, HealthChecker, HealthRecord, HEALTH_HASH};
use conduit::routing::Selector;
use conduit::session::{SessionConfig, SessionStore};
use conduit::store::KvStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A fully wired application over an in-memory store.
pub struct TestApp {
    pub store: Arc<KvStore>,
    pub registry: Arc<ChainRegistry>,
    pub selector: Arc<Selector>,
    pub sessions: Arc<SessionStore>,
    pub checker: Arc<HealthChecker>,
    pub router: axum::Router,
    pub chains_file: PathBuf,
    // Keeps the chains file alive for the test's duration.
    _dir: TempDir,
}

/// Build the component graph around a chains file with the given contents.
/// No reload is performed; call `app.registry.reload()` or seed directly.
pub async fn make_app(chains_json: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let chains_file = dir.path().join("chains.json");
    std::fs::write(&chains_file, chains_json).unwrap();

    let store = Arc::new(KvStore::open_in_memory().unwrap());
    let health_config = HealthCheckConfig::default();
    let checker = Arc::new(HealthChecker::new(store.clone(), health_config.clone()));

    let registry = Arc::new(ChainRegistry::new(
        store.clone(),
        checker.clone(),
        ChainsConfig {
            file: chains_file.clone(),
            ..ChainsConfig::default()
        },
        health_config.health_ttl_secs,
    ));

    let selector = Arc::new(Selector::new(
        store.clone(),
        registry.clone(),
        health_config.max_fail_count,
    ));
    let sessions = Arc::new(SessionStore::new(
        store.clone(),
        selector.clone(),
        SessionConfig::default(),
    ));
    let executor = Executor::new(sessions.clone(), checker.clone());

    let mut config = ConduitConfig::default();
    config.chains.file = chains_file.clone();

    let state = Arc::new(AppState::new(
        store.clone(),
        registry.clone(),
        selector.clone(),
        sessions.clone(),
        executor,
        checker.clone(),
        Arc::new(config),
    ));

    TestApp {
        store,
        registry,
        selector,
        sessions,
        checker,
        router: create_router(state),
        chains_file,
        _dir: dir,
    }
}

/// JSON text of a chains file with one chain.
pub fn chains_json(chain_id: u64, name: &str, urls: &[&str]) -> String {
    json!({
        "chains": [{ "chainId": chain_id, "name": name, "urls": urls }]
    })
    .to_string()
}

/// Write a chain record straight into the store.
pub fn seed_chain(store: &KvStore, chain_id: u64, name: &str, urls: &[&str]) {
    let chain = ChainConfig {
        chain_id,
        name: name.to_string(),
        urls: urls.iter().map(|url| url.to_string()).collect(),
    };
    store
        .set(
            &chain_key(chain_id),
            &serde_json::to_string(&chain).unwrap(),
            None,
        )
        .unwrap();
}

/// Write a health record straight into the store.
pub fn seed_health(store: &KvStore, url: &str, healthy: bool, response_time: u64, fail_count: u32) {
    let record = HealthRecord {
        url: url.to_string(),
        healthy,
        last_check: Utc::now(),
        response_time,
        fail_count,
    };
    store
        .hash_set(HEALTH_HASH, url, &serde_json::to_string(&record).unwrap())
        .unwrap();
}

/// Start a mock upstream that answers every POST (probes included) with
/// the given JSON-RPC body.
pub async fn mock_upstream(body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Start a mock upstream that answers every POST with the given status and
/// body.
pub async fn mock_upstream_with_status(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Drive a GET through the router and decode the JSON body.
pub async fn get(router: &axum::Router, path: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    decode(response).await
}

/// Drive a POST with a JSON body (and optional headers) through the router.
pub async fn post_json(
    router: &axum::Router,
    path: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    decode(response).await
}

async fn decode(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// A syntactically valid JSON-RPC request body.
pub fn rpc_request(method: &str) -> Value {
    json!({"jsonrpc": "2.0", "method": method, "params": [], "id": 1})
}
