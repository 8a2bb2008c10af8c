//! HTTP API surface.
//!
//! Conduit's caller-facing endpoints:
//!
//! - `GET /api/rpc/endpoint/{chainId}` - resolve one healthy upstream
//! - `POST /api/rpc/execute/{chainId}` - forward a JSON-RPC call
//!   (optional `x-session-id` header pins the upstream)
//! - `GET /api/rpc/urls` - per-chain summaries (`?chainId=` narrows)
//! - `GET /api/rpc/urls/{chainId}` - one chain's stats and URL details
//! - `GET /health` - liveness
//! - `GET /metrics` - Prometheus text format
//!
//! Success bodies use a `{"success": true, "data": ...}` envelope except
//! for execute, whose body is the formatted upstream reply itself.

mod endpoint;
mod execute;
mod health;
mod metrics;
pub mod types;
mod urls;

pub use execute::SESSION_HEADER;
pub use types::{validate_json_rpc, ApiError};
pub use urls::{ChainStats, ChainSummary, UrlDetail};

use crate::chains::ChainRegistry;
use crate::config::ConduitConfig;
use crate::executor::Executor;
use crate::health::HealthChecker;
use crate::routing::Selector;
use crate::session::SessionStore;
use crate::store::KvStore;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum request body size (2 MB). JSON-RPC calls are small; anything
/// larger is hostile or misdirected.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub store: Arc<KvStore>,
    pub registry: Arc<ChainRegistry>,
    pub selector: Arc<Selector>,
    pub sessions: Arc<SessionStore>,
    pub executor: Executor,
    pub checker: Arc<HealthChecker>,
    pub config: Arc<ConduitConfig>,
    pub prometheus_handle: PrometheusHandle,
}

impl AppState {
    /// Assemble the application state and install the metrics recorder
    /// (reusing a detached handle if one is already installed, as happens
    /// in tests).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<KvStore>,
        registry: Arc<ChainRegistry>,
        selector: Arc<Selector>,
        sessions: Arc<SessionStore>,
        executor: Executor,
        checker: Arc<HealthChecker>,
        config: Arc<ConduitConfig>,
    ) -> Self {
        let prometheus_handle = metrics::setup_metrics().unwrap_or_else(|error| {
            tracing::debug!(%error, "Metrics recorder already installed, using detached handle");
            metrics::detached_handle()
        });

        Self {
            store,
            registry,
            selector,
            sessions,
            executor,
            checker,
            config,
            prometheus_handle,
        }
    }
}

/// Create the API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rpc/endpoint/{chain_id}", get(endpoint::handle))
        .route("/api/rpc/execute/{chain_id}", post(execute::handle))
        .route("/api/rpc/urls", get(urls::list))
        .route("/api/rpc/urls/{chain_id}", get(urls::detail))
        .route("/health", get(health::handle))
        .route("/metrics", get(metrics::handle))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}
