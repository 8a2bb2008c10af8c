//! Execute handler.

use crate::api::{types::validate_json_rpc, ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;

/// Header that pins a request to an existing session.
pub const SESSION_HEADER: &str = "x-session-id";

/// POST /api/rpc/execute/{chainId} - Forward a JSON-RPC call.
///
/// Validation failures never reach an upstream. The reply carries the
/// session id the call ended up bound to (which differs from the supplied
/// one after a chain switch).
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    validate_json_rpc(&payload)?;

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    metrics::counter!("conduit_requests_total", "chain" => chain_id.to_string()).increment(1);

    let reply = state
        .executor
        .execute(chain_id, payload, session_id.as_deref())
        .await?;
    Ok(Json(reply))
}
