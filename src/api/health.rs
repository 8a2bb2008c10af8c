//! Liveness endpoint handler.

use axum::Json;
use serde_json::{json, Value};

/// GET /health - Process liveness.
pub async fn handle() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
