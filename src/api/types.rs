//! Request validation and API error mapping.

use crate::chains::ChainError;
use crate::executor::ExecuteError;
use crate::health::HealthError;
use crate::routing::RoutingError;
use crate::session::SessionError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

/// An error ready to leave the HTTP surface.
///
/// Failure bodies mirror the success envelope:
/// `{"success": false, "error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<RoutingError> for ApiError {
    fn from(error: RoutingError) -> Self {
        match error {
            RoutingError::ChainNotFound(chain_id) => {
                Self::not_found(format!("chain {chain_id} not found"))
            }
            RoutingError::NoHealthyRpc(chain_id) => {
                Self::internal(format!("no healthy RPC endpoint for chain {chain_id}"))
            }
            RoutingError::Store(_) => Self::internal("Internal server error"),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Routing(routing) => routing.into(),
            SessionError::Store(_) | SessionError::Serialize(_) => {
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<ExecuteError> for ApiError {
    fn from(error: ExecuteError) -> Self {
        match error {
            ExecuteError::InvalidSession(id) => Self::internal(format!("invalid session {id}")),
            ExecuteError::NoHealthyRpc(chain_id) => {
                Self::internal(format!("no healthy RPC endpoint for chain {chain_id}"))
            }
            ExecuteError::Session(session) => session.into(),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(_: ChainError) -> Self {
        Self::internal("Internal server error")
    }
}

impl From<HealthError> for ApiError {
    fn from(_: HealthError) -> Self {
        Self::internal("Internal server error")
    }
}

impl From<StoreError> for ApiError {
    fn from(_: StoreError) -> Self {
        Self::internal("Internal server error")
    }
}

/// Validate an incoming JSON-RPC request body.
///
/// Accepted iff: the body is an object, `jsonrpc` is exactly `"2.0"`,
/// `method` is a string, `id` is present (any type), and `params` is either
/// absent or an array.
pub fn validate_json_rpc(body: &Value) -> Result<(), ApiError> {
    let Some(request) = body.as_object() else {
        return Err(ApiError::bad_request("request body must be a JSON object"));
    };
    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(ApiError::bad_request("jsonrpc must be \"2.0\""));
    }
    if !request.get("method").map(Value::is_string).unwrap_or(false) {
        return Err(ApiError::bad_request("method must be a string"));
    }
    if !request.contains_key("id") {
        return Err(ApiError::bad_request("id is required"));
    }
    match request.get("params") {
        None | Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(ApiError::bad_request("params must be an array")),
    }
}
