use std::path::PathBuf;

/// Errors that can occur while loading the process configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {field}: {message}")]
    Validation { field: String, message: String },
}
