//! Configuration for upstream health checking.

use serde::{Deserialize, Serialize};

/// Configuration for the upstream health checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether the periodic checker is enabled
    pub enabled: bool,
    /// Milliseconds between probe cycles
    pub interval_ms: u64,
    /// Timeout for each probe request
    pub probe_timeout_ms: u64,
    /// Consecutive failures at which an upstream becomes ineligible
    pub max_fail_count: u32,
    /// TTL refreshed on the health hash at every configuration reload
    pub health_ttl_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
            probe_timeout_ms: 5_000,
            max_fail_count: 3,
            health_ttl_secs: 3_600,
        }
    }
}
