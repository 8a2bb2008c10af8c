//! Configuration for the chain-file loader.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the chain-configuration file and its reload policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// Path of the chain JSON file, relative to the working directory
    pub file: PathBuf,
    /// Milliseconds between modification-time polls
    pub refresh_interval_ms: u64,
    /// TTL applied to every `chain:*` key on reload
    pub config_ttl_secs: u64,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("chains.json"),
            refresh_interval_ms: 300_000,
            config_ttl_secs: 86_400,
        }
    }
}
