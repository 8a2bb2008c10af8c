//! Sticky session store.
//!
//! Binds a client-facing opaque id to one upstream for the lifetime of a
//! TTL. The store's native TTL is the authoritative expiry mechanism; an
//! optional periodic sweep removes leftovers whose `last_used` stamp aged
//! out.

mod config;
mod error;
mod types;

pub use config::SessionConfig;
pub use error::SessionError;
pub use types::{session_key, Session, SESSION_KEY_PREFIX};

use crate::routing::Selector;
use crate::store::KvStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Creates, fetches, refreshes, and expires session records.
pub struct SessionStore {
    store: Arc<KvStore>,
    selector: Arc<Selector>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(store: Arc<KvStore>, selector: Arc<Selector>, config: SessionConfig) -> Self {
        Self {
            store,
            selector,
            config,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.session_ttl_secs)
    }

    /// Create a session for `chain_id`, pinned to whatever upstream the
    /// selector picks right now.
    pub async fn create(&self, chain_id: u64) -> Result<Session, SessionError> {
        let url = self.selector.healthy_rpc_url(chain_id).await?;
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            url,
            chain_id,
            created_at: now,
            last_used: now,
            request_count: 0,
        };
        self.write(&session)?;
        tracing::debug!(session_id = %session.id, chain_id, url = %session.url, "Session created");
        Ok(session)
    }

    /// Fetch a session. Absent, expired, and corrupt records read as `None`.
    pub fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let Some(raw) = self.store.get(&session_key(id))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(error) => {
                tracing::warn!(session_id = id, %error, "Dropping corrupt session record");
                Ok(None)
            }
        }
    }

    /// Mark a successful use: bump `last_used` and `request_count`, rewrite
    /// with a fresh TTL. Returns the updated record.
    pub fn touch(&self, session: &Session) -> Result<Session, SessionError> {
        let mut updated = session.clone();
        updated.last_used = Utc::now();
        updated.request_count += 1;
        self.write(&updated)?;
        Ok(updated)
    }

    /// Delete a session. Deleting an absent session is not an error.
    pub fn remove(&self, id: &str) -> Result<(), SessionError> {
        self.store.delete(&session_key(id))?;
        Ok(())
    }

    /// Belt-and-braces sweep: delete every session whose `last_used` age
    /// exceeds the TTL, plus any record that no longer parses. Returns how
    /// many were removed.
    pub fn cleanup(&self) -> Result<usize, SessionError> {
        let ttl = chrono::Duration::seconds(self.config.session_ttl_secs as i64);
        let now = Utc::now();
        let mut removed = 0;

        for key in self.store.keys_with_prefix(SESSION_KEY_PREFIX)? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            let stale = match serde_json::from_str::<Session>(&raw) {
                Ok(session) => now - session.last_used > ttl,
                Err(_) => true,
            };
            if stale {
                self.store.delete(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of live sessions bound to `chain_id`.
    pub fn count_for_chain(&self, chain_id: u64) -> Result<usize, SessionError> {
        let mut count = 0;
        for key in self.store.keys_with_prefix(SESSION_KEY_PREFIX)? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            if let Ok(session) = serde_json::from_str::<Session>(&raw) {
                if session.chain_id == chain_id {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn write(&self, session: &Session) -> Result<(), SessionError> {
        self.store.set(
            &session_key(&session.id),
            &serde_json::to_string(session)?,
            Some(self.ttl()),
        )?;
        Ok(())
    }

    /// Start the periodic sweep task.
    pub fn start_sweeper(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.cleanup_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = self.config.cleanup_interval_secs,
                "Session sweeper started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Session sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.cleanup() {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(removed, "Swept expired sessions");
                            }
                            Ok(_) => {}
                            Err(error) => tracing::warn!(%error, "Session sweep failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{chain_key, ChainConfig, ChainError, ReloadConfig};
    use crate::health::{HealthRecord, HEALTH_HASH};
    use async_trait::async_trait;

    struct NoReload;

    #[async_trait]
    impl ReloadConfig for NoReload {
        async fn reload(&self) -> Result<(), ChainError> {
            Ok(())
        }
    }

    fn seed_chain_with_healthy_url(store: &KvStore, chain_id: u64, url: &str) {
        let chain = ChainConfig {
            chain_id,
            name: format!("chain-{chain_id}"),
            urls: vec![url.to_string()],
        };
        store
            .set(
                &chain_key(chain_id),
                &serde_json::to_string(&chain).unwrap(),
                None,
            )
            .unwrap();
        let record = HealthRecord {
            url: url.to_string(),
            healthy: true,
            last_check: Utc::now(),
            response_time: 5,
            fail_count: 0,
        };
        store
            .hash_set(HEALTH_HASH, url, &serde_json::to_string(&record).unwrap())
            .unwrap();
    }

    fn make_sessions(store: Arc<KvStore>) -> SessionStore {
        let selector = Arc::new(Selector::new(store.clone(), Arc::new(NoReload), 3));
        SessionStore::new(store, selector, SessionConfig::default())
    }

    #[tokio::test]
    async fn test_create_binds_to_selected_upstream() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        seed_chain_with_healthy_url(&store, 1, "http://a");

        let sessions = make_sessions(store);
        let session = sessions.create(1).await.unwrap();

        assert_eq!(session.url, "http://a");
        assert_eq!(session.chain_id, 1);
        assert_eq!(session.request_count, 0);

        let read_back = sessions.get(&session.id).unwrap().unwrap();
        assert_eq!(read_back, session);
    }

    #[tokio::test]
    async fn test_create_fails_without_healthy_upstream() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        let sessions = make_sessions(store);
        assert!(matches!(
            sessions.create(1).await,
            Err(SessionError::Routing(_))
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        let sessions = make_sessions(store);
        assert!(sessions.get("nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_bumps_counter_and_last_used() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        seed_chain_with_healthy_url(&store, 1, "http://a");

        let sessions = make_sessions(store);
        let session = sessions.create(1).await.unwrap();

        let touched = sessions.touch(&session).unwrap();
        assert_eq!(touched.request_count, 1);
        assert!(touched.last_used >= session.last_used);
        // Binding is untouched.
        assert_eq!(touched.url, session.url);
        assert_eq!(touched.chain_id, session.chain_id);

        let read_back = sessions.get(&session.id).unwrap().unwrap();
        assert_eq!(read_back.request_count, 1);
    }

    #[tokio::test]
    async fn test_remove_deletes_record() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        seed_chain_with_healthy_url(&store, 1, "http://a");

        let sessions = make_sessions(store);
        let session = sessions.create(1).await.unwrap();

        sessions.remove(&session.id).unwrap();
        assert!(sessions.get(&session.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_stale_and_corrupt_records() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        seed_chain_with_healthy_url(&store, 1, "http://a");
        let sessions = make_sessions(store.clone());

        let fresh = sessions.create(1).await.unwrap();

        // A record whose last_used predates the TTL, written without a
        // store-level TTL so only the sweep can catch it.
        let stale = Session {
            id: "stale".to_string(),
            url: "http://a".to_string(),
            chain_id: 1,
            created_at: Utc::now() - chrono::Duration::hours(3),
            last_used: Utc::now() - chrono::Duration::hours(2),
            request_count: 9,
        };
        store
            .set(
                &session_key(&stale.id),
                &serde_json::to_string(&stale).unwrap(),
                None,
            )
            .unwrap();
        store.set("session:garbage", "not json", None).unwrap();

        assert_eq!(sessions.cleanup().unwrap(), 2);
        assert!(sessions.get(&fresh.id).unwrap().is_some());
        assert!(sessions.get("stale").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_for_chain_filters_by_chain() {
        let store = Arc::new(KvStore::open_in_memory().unwrap());
        seed_chain_with_healthy_url(&store, 1, "http://a");
        seed_chain_with_healthy_url(&store, 137, "http://b");

        let sessions = make_sessions(store);
        sessions.create(1).await.unwrap();
        sessions.create(1).await.unwrap();
        sessions.create(137).await.unwrap();

        assert_eq!(sessions.count_for_chain(1).unwrap(), 2);
        assert_eq!(sessions.count_for_chain(137).unwrap(), 1);
        assert_eq!(sessions.count_for_chain(5).unwrap(), 0);
    }
}
