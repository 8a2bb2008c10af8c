//! Upstream selection.
//!
//! Stateless per call apart from a small collapse window: when selections
//! for any chain keep coming up empty, the selector forces a configuration
//! reload as a self-healing measure.

mod error;

pub use error::RoutingError;

use crate::chains::{chain_key, ChainConfig, ReloadConfig};
use crate::health::{HealthRecord, HEALTH_HASH};
use crate::store::KvStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Failed selections within the window that force a reload.
const COLLAPSE_THRESHOLD: usize = 3;
/// Width of the collapse window.
const COLLAPSE_WINDOW: Duration = Duration::from_secs(10);

/// Chooses the fastest eligible upstream for a chain.
pub struct Selector {
    store: Arc<KvStore>,
    reloader: Arc<dyn ReloadConfig>,
    max_fail_count: u32,
    /// Timestamps of recent empty selections, any chain
    collapse_window: Mutex<Vec<Instant>>,
}

impl Selector {
    pub fn new(store: Arc<KvStore>, reloader: Arc<dyn ReloadConfig>, max_fail_count: u32) -> Self {
        Self {
            store,
            reloader,
            max_fail_count,
            collapse_window: Mutex::new(Vec::new()),
        }
    }

    /// Pick one eligible upstream for `chain_id`.
    ///
    /// Eligible means: a health record exists, its last probe succeeded, and
    /// its consecutive-failure count is below the threshold. Among eligible
    /// URLs the fastest wins; ties go to the earlier position in the chain's
    /// configured URL list. Never-probed URLs are not eligible.
    pub async fn healthy_rpc_url(&self, chain_id: u64) -> Result<String, RoutingError> {
        let chain = self
            .load_chain(chain_id)?
            .ok_or(RoutingError::ChainNotFound(chain_id))?;
        let health = self.load_health()?;

        let mut best: Option<(&str, u64)> = None;
        for url in &chain.urls {
            let Some(record) = health.get(url) else {
                continue;
            };
            if !record.is_eligible(self.max_fail_count) {
                continue;
            }
            match best {
                Some((_, fastest)) if record.response_time >= fastest => {}
                _ => best = Some((url, record.response_time)),
            }
        }

        match best {
            Some((url, _)) => Ok(url.to_string()),
            None => {
                if self.note_collapse() {
                    tracing::warn!(
                        chain_id,
                        "Upstream pool collapsed, forcing configuration reload"
                    );
                    if let Err(error) = self.reloader.reload().await {
                        tracing::error!(%error, "Collapse-triggered reload failed");
                    }
                }
                Err(RoutingError::NoHealthyRpc(chain_id))
            }
        }
    }

    fn load_chain(&self, chain_id: u64) -> Result<Option<ChainConfig>, RoutingError> {
        let Some(raw) = self.store.get(&chain_key(chain_id))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(chain) => Ok(Some(chain)),
            Err(error) => {
                tracing::warn!(chain_id, %error, "Dropping corrupt chain record");
                Ok(None)
            }
        }
    }

    fn load_health(&self) -> Result<HashMap<String, HealthRecord>, RoutingError> {
        let mut health = HashMap::new();
        for (url, raw) in self.store.hash_get_all(HEALTH_HASH)? {
            match serde_json::from_str::<HealthRecord>(&raw) {
                Ok(record) => {
                    health.insert(url, record);
                }
                Err(error) => tracing::warn!(%url, %error, "Dropping corrupt health record"),
            }
        }
        Ok(health)
    }

    /// Record one empty selection; true when the window filled up (and was
    /// cleared) so the caller should force a reload.
    fn note_collapse(&self) -> bool {
        let mut window = self
            .collapse_window
            .lock()
            .expect("collapse window mutex poisoned");
        let now = Instant::now();
        window.retain(|at| now.duration_since(*at) <= COLLAPSE_WINDOW);
        window.push(now);
        if window.len() >= COLLAPSE_THRESHOLD {
            window.clear();
            true
        } else {
            false
        }
    }
}
