//! Configuration for the session store.

use serde::{Deserialize, Serialize};

/// Configuration for sticky sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TTL of a session record, refreshed on every successful request
    pub session_ttl_secs: u64,
    /// Seconds between belt-and-braces expiry sweeps; 0 disables the sweep
    /// (the store's own TTL remains authoritative)
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 3_600,
            cleanup_interval_secs: 600,
        }
    }
}
