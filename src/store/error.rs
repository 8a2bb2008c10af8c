use std::path::PathBuf;

/// Errors that can occur during key-value store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create store directory {0}")]
    CreateDir(PathBuf),

    #[error("unsupported store schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}
