use crate::store::StoreError;
use std::path::PathBuf;

/// Errors that can occur while loading or reading chain configuration
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read chain configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialize chain configuration: {0}")]
    Serialize(serde_json::Error),
}
