use crate::routing::RoutingError;
use crate::store::StoreError;

/// Errors that can occur during session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
}
