//! Configuration module for Conduit
//!
//! Provides layered configuration loading from a TOML file, environment
//! variables, and defaults. CLI flags are applied on top by the `serve`
//! command.

pub mod error;
pub mod logging;
pub mod server;
pub mod store;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;
pub use store::StoreConfig;

// Re-export per-concern configs from the modules that own them.
pub use crate::chains::ChainsConfig;
pub use crate::health::HealthCheckConfig;
pub use crate::session::SessionConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct that holds all sub-configurations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConduitConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub chains: ChainsConfig,
    pub health_check: HealthCheckConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl ConduitConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports CONDUIT_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("CONDUIT_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("CONDUIT_HOST") {
            self.server.host = host;
        }
        if let Ok(level) = std::env::var("CONDUIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONDUIT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(file) = std::env::var("CONDUIT_CHAINS_FILE") {
            self.chains.file = PathBuf::from(file);
        }
        if let Ok(path) = std::env::var("CONDUIT_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.chains.file.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                field: "chains.file".to_string(),
                message: "chain configuration file path cannot be empty".to_string(),
            });
        }
        if self.chains.refresh_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "chains.refresh_interval_ms".to_string(),
                message: "refresh interval must be non-zero".to_string(),
            });
        }
        if self.health_check.interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "health_check.interval_ms".to_string(),
                message: "probe interval must be non-zero".to_string(),
            });
        }
        if self.health_check.max_fail_count == 0 {
            return Err(ConfigError::Validation {
                field: "health_check.max_fail_count".to_string(),
                message: "max_fail_count must be at least 1".to_string(),
            });
        }
        if self.session.session_ttl_secs == 0 {
            return Err(ConfigError::Validation {
                field: "session.session_ttl_secs".to_string(),
                message: "session TTL must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
