//! Health record for a single upstream URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the store hash whose fields are upstream URLs and whose values
/// are serialized [`HealthRecord`]s. The hash is global: a URL shared by
/// several chains has exactly one record.
pub const HEALTH_HASH: &str = "health";

/// The router's view of one upstream's reachability.
///
/// `healthy` reflects the most recent probe; eligibility for traffic is a
/// policy decision layered on top of `fail_count` (see
/// [`HealthRecord::is_eligible`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub url: String,
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    /// Last round-trip time in milliseconds, successful or not.
    pub response_time: u64,
    /// Consecutive failures since the last success.
    pub fail_count: u32,
}

impl HealthRecord {
    /// Whether this upstream may receive traffic: the last probe succeeded
    /// and the consecutive-failure count is below the policy threshold.
    pub fn is_eligible(&self, max_fail_count: u32) -> bool {
        self.healthy && self.fail_count < max_fail_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(healthy: bool, fail_count: u32) -> HealthRecord {
        HealthRecord {
            url: "http://node".to_string(),
            healthy,
            last_check: Utc::now(),
            response_time: 10,
            fail_count,
        }
    }

    #[test]
    fn test_eligible_requires_healthy() {
        assert!(record(true, 0).is_eligible(3));
        assert!(!record(false, 0).is_eligible(3));
    }

    #[test]
    fn test_eligible_requires_fail_count_below_threshold() {
        assert!(record(true, 2).is_eligible(3));
        assert!(!record(true, 3).is_eligible(3));
        assert!(!record(true, 4).is_eligible(3));
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(record(true, 0)).unwrap();
        assert!(json.get("failCount").is_some());
        assert!(json.get("responseTime").is_some());
        assert!(json.get("lastCheck").is_some());
    }
}
