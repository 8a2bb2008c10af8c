use crate::store::StoreError;

/// Errors that can occur while reading or writing health records
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialize health record: {0}")]
    Serialize(#[from] serde_json::Error),
}
