//! Session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-key prefix under which session records live.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Store key for one session.
pub fn session_key(id: &str) -> String {
    format!("session:{id}")
}

/// A sticky binding between a client-held opaque id and one upstream.
///
/// `url` and `chain_id` are immutable for the session's lifetime; switching
/// chain or upstream means deleting the session and creating a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub url: String,
    pub chain_id: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Advisory counter; not strictly monotonic under concurrent reuse of
    /// the same id.
    pub request_count: u64,
}
