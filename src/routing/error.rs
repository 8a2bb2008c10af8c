use crate::store::StoreError;

/// Errors that can occur during upstream selection
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("chain {0} not found")]
    ChainNotFound(u64),

    #[error("no healthy RPC endpoint for chain {0}")]
    NoHealthyRpc(u64),

    #[error(transparent)]
    Store(#[from] StoreError),
}
