//! Endpoint lookup handler.

use crate::api::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /api/rpc/endpoint/{chainId} - Resolve one healthy upstream now.
///
/// Stateless: repeated calls may return different URLs as health shifts.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let url = state.selector.healthy_rpc_url(chain_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "url": url },
    })))
}
