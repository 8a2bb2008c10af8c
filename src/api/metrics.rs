//! Prometheus metrics endpoint.

use crate::api::AppState;
use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder. Fails if a recorder is already
/// installed (e.g. a second AppState in the same process).
pub fn setup_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Fallback handle for processes where the recorder is already installed:
/// renders an empty registry instead of failing.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// GET /metrics - Prometheus text exposition.
pub async fn handle(State(state): State<Arc<AppState>>) -> String {
    state.prometheus_handle.render()
}
