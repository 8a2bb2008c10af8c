//! Chain configuration registry.
//!
//! Keeps the store-resident chain set consistent with an on-disk JSON file:
//! polls the file's modification time, reloads on change, diffs the upstream
//! set against the health hash, and reconciles everything in one store
//! transaction so readers never observe a half-applied configuration.

mod config;
mod error;
mod types;


pub use config::ChainsConfig;
pub use error::ChainError;
pub use types::{chain_key, ChainConfig, CHAIN_KEY_PREFIX};

use crate::health::{ProbeHealth, HEALTH_HASH};
use crate::store::KvStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use types::ChainsFile;

/// Reload capability handed to the selector so a pool collapse can force a
/// configuration reload without the selector depending on the registry type.
#[async_trait]
pub trait ReloadConfig: Send + Sync {
    /// Re-read the configuration file and reconcile the store.
    async fn reload(&self) -> Result<(), ChainError>;
}

/// Parse and validate chain-file contents without touching the store.
///
/// The file must be an object with a `chains` array whose elements all
/// carry `chainId`, `name`, and `urls`; chain ids must be unique. URLs are
/// deduplicated in place, preserving input order.
pub fn parse_chains(raw: &str) -> Result<Vec<ChainConfig>, ChainError> {
    let file: ChainsFile =
        serde_json::from_str(raw).map_err(|error| ChainError::InvalidConfig(error.to_string()))?;

    let mut seen = HashSet::new();
    let mut chains = file.chains;
    for chain in &mut chains {
        if !seen.insert(chain.chain_id) {
            return Err(ChainError::InvalidConfig(format!(
                "duplicate chainId {}",
                chain.chain_id
            )));
        }
        chain.dedup_urls();
    }
    Ok(chains)
}

/// Watches the chain-configuration file and mirrors it into the store.
pub struct ChainRegistry {
    store: Arc<KvStore>,
    prober: Arc<dyn ProbeHealth>,
    config: ChainsConfig,
    /// TTL refreshed on the health hash at every reload
    health_ttl: Duration,
    /// Modification time of the last successfully loaded file
    last_modified: Mutex<Option<SystemTime>>,
    /// Serializes concurrent reloads; a second caller waits its turn
    reload_lock: Mutex<()>,
}

impl ChainRegistry {
    pub fn new(
        store: Arc<KvStore>,
        prober: Arc<dyn ProbeHealth>,
        config: ChainsConfig,
        health_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            prober,
            config,
            health_ttl: Duration::from_secs(health_ttl_secs),
            last_modified: Mutex::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// Configuration of one chain, if present. Corrupt records read as
    /// absent.
    pub fn get_chain(&self, chain_id: u64) -> Result<Option<ChainConfig>, ChainError> {
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

    /// Every chain currently mirrored in the store, ordered by key.
    pub fn chains(&self) -> Result<Vec<ChainConfig>, ChainError> {
        let mut chains = Vec::new();
        for key in self.store.keys_with_prefix(CHAIN_KEY_PREFIX)? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<ChainConfig>(&raw) {
                Ok(chain) => chains.push(chain),
                Err(error) => tracing::warn!(%key, %error, "Dropping corrupt chain record"),
            }
        }
        chains.sort_by_key(|chain| chain.chain_id);
        Ok(chains)
    }

    /// Force a reload now. Concurrent callers serialize; the file is read
    /// once per caller and the store is reconciled in a single transaction,
    /// so readers never see interleaved writes. On any error the prior
    /// state is left intact.
    pub async fn reload(&self) -> Result<(), ChainError> {
        let _guard = self.reload_lock.lock().await;
        self.reload_inner().await
    }

    async fn reload_inner(&self) -> Result<(), ChainError> {
        let path = &self.config.file;
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ChainError::Io {
                path: path.clone(),
                source,
            })?;
        let chains = parse_chains(&raw)?;

        let old_urls: HashSet<String> = self
            .store
            .hash_get_all(HEALTH_HASH)?
            .into_iter()
            .map(|(url, _)| url)
            .collect();

        // Ordered union of every chain's URLs, first occurrence wins.
        let mut new_urls = Vec::new();
        let mut seen = HashSet::new();
        for chain in &chains {
            for url in &chain.urls {
                if seen.insert(url.clone()) {
                    new_urls.push(url.clone());
                }
            }
        }

        let mut records = Vec::with_capacity(chains.len());
        for chain in &chains {
            let serialized = serde_json::to_string(chain).map_err(ChainError::Serialize)?;
            records.push((chain_key(chain.chain_id), serialized));
        }

        let config_ttl = Duration::from_secs(self.config.config_ttl_secs);
        self.store.transaction(|tx| {
            tx.delete_prefix(CHAIN_KEY_PREFIX)?;
            for url in old_urls.iter().filter(|url| !seen.contains(*url)) {
                tx.hash_delete(HEALTH_HASH, url)?;
            }
            for (key, serialized) in &records {
                tx.set(key, serialized, Some(config_ttl))?;
            }
            tx.hash_expire(HEALTH_HASH, self.health_ttl)?;
            Ok(())
        })?;

        tracing::info!(
            chains = chains.len(),
            urls = new_urls.len(),
            "Chain configuration loaded"
        );

        // Probe every loaded URL outside the transaction so new upstreams
        // appear in the health projection immediately and existing ones get
        // a fresh reading.
        let probes = new_urls.iter().map(|url| self.prober.check_url(url));
        for (url, outcome) in new_urls.iter().zip(futures::future::join_all(probes).await) {
            if let Err(error) = outcome {
                tracing::error!(%url, %error, "Post-reload probe failed");
            }
        }
        Ok(())
    }

    /// Check the file's modification time and reload when it moved forward
    /// (or when nothing was ever loaded). Returns whether a reload ran.
    pub async fn poll_once(&self) -> Result<bool, ChainError> {
        let path = &self.config.file;
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|source| ChainError::Io {
                path: path.clone(),
                source,
            })?;

        let mut last = self.last_modified.lock().await;
        let changed = match *last {
            None => true,
            Some(previous) => modified > previous,
        };
        if !changed {
            return Ok(false);
        }

        // Record the new stamp only after a successful load, so a broken
        // file is retried on the next tick and the prior state stays live.
        self.reload().await?;
        *last = Some(modified);
        Ok(true)
    }

    /// Start the periodic file poller.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(self.config.refresh_interval_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                file = %self.config.file.display(),
                interval_ms = self.config.refresh_interval_ms,
                "Chain configuration poller started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Chain configuration poller shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.poll_once().await {
                            Ok(true) => tracing::info!("Chain configuration reloaded"),
                            Ok(false) => tracing::debug!("Chain configuration unchanged"),
                            Err(error) => {
                                tracing::warn!(%error, "Chain configuration poll failed, keeping prior state");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ReloadConfig for ChainRegistry {
    async fn reload(&self) -> Result<(), ChainError> {
        ChainRegistry::reload(self).await
    }
}
