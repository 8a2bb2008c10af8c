//! Health checking module for upstream monitoring.
//!
//! Maintains the `health` hash in the shared store as a live projection of
//! upstream reachability. A background task probes every known URL on an
//! interval; the executor forces an immediate probe through
//! [`HealthChecker::check_url`] when a forwarded request fails.

mod config;
mod error;
mod record;

#[cfg(test)]
mod tests;

pub use config::HealthCheckConfig;
pub use error::HealthError;
pub use record::{HealthRecord, HEALTH_HASH};

use crate::store::KvStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Probe capability handed to the config loader so freshly loaded URLs get
/// a record immediately, without the loader depending on the checker type.
#[async_trait]
pub trait ProbeHealth: Send + Sync {
    /// Probe `url` right now and return the freshly written record.
    async fn check_url(&self, url: &str) -> Result<HealthRecord, HealthError>;
}

/// Background service that periodically probes every known upstream.
pub struct HealthChecker {
    store: Arc<KvStore>,
    /// HTTP client with connection pooling, probe timeout baked in
    client: reqwest::Client,
    config: HealthCheckConfig,
}

impl HealthChecker {
    /// Create a new health checker with a default HTTP client.
    pub fn new(store: Arc<KvStore>, config: HealthCheckConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.probe_timeout_ms))
            .build()
            .expect("Failed to build probe HTTP client");
        Self {
            store,
            client,
            config,
        }
    }

    /// Create a health checker with a custom HTTP client (for testing).
    pub fn with_client(
        store: Arc<KvStore>,
        config: HealthCheckConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// URLs currently present in the health hash.
    pub fn known_urls(&self) -> Result<Vec<String>, HealthError> {
        Ok(self
            .store
            .hash_get_all(HEALTH_HASH)?
            .into_iter()
            .map(|(url, _)| url)
            .collect())
    }

    /// Every parseable record in the health hash, keyed by URL.
    pub fn records(&self) -> Result<std::collections::HashMap<String, HealthRecord>, HealthError> {
        let mut records = std::collections::HashMap::new();
        for (url, raw) in self.store.hash_get_all(HEALTH_HASH)? {
            match serde_json::from_str::<HealthRecord>(&raw) {
                Ok(record) => {
                    records.insert(url, record);
                }
                Err(error) => tracing::warn!(%url, %error, "Dropping corrupt health record"),
            }
        }
        Ok(records)
    }

    /// Last written record for `url`, if any. Corrupt entries read as absent.
    pub fn record(&self, url: &str) -> Result<Option<HealthRecord>, HealthError> {
        let Some(raw) = self.store.hash_get(HEALTH_HASH, url)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                tracing::warn!(url, %error, "Dropping corrupt health record");
                Ok(None)
            }
        }
    }

    /// Send the canonical probe and report (success, elapsed milliseconds).
    ///
    /// A probe succeeds iff the upstream answers HTTP 200 with a JSON body
    /// that has a `result` field (`null` counts as present).
    async fn probe(&self, url: &str) -> (bool, u64) {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "net_version",
            "params": [],
            "id": 1,
        });

        let started = Instant::now();
        let ok = match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => body.get("result").is_some(),
                    Err(_) => false,
                }
            }
            _ => false,
        };
        (ok, started.elapsed().as_millis() as u64)
    }

    /// Probe `url` immediately and persist the outcome.
    ///
    /// Idempotent and safe to call concurrently; the hash write is
    /// last-writer-wins. On failure the consecutive-failure counter is
    /// carried over from the previous record (a never-probed URL that fails
    /// starts at 1).
    pub async fn check_url(&self, url: &str) -> Result<HealthRecord, HealthError> {
        let (ok, elapsed) = self.probe(url).await;

        metrics::histogram!("conduit_probe_duration_seconds", "healthy" => ok.to_string())
            .record(elapsed as f64 / 1000.0);

        let record = if ok {
            HealthRecord {
                url: url.to_string(),
                healthy: true,
                last_check: Utc::now(),
                response_time: elapsed,
                fail_count: 0,
            }
        } else {
            let previous = self.record(url)?.map(|r| r.fail_count).unwrap_or(0);
            let fail_count = previous.saturating_add(1);
            if fail_count == self.config.max_fail_count {
                tracing::warn!(
                    url,
                    fail_count,
                    "Upstream crossed the failure threshold and is no longer eligible"
                );
            }
            HealthRecord {
                url: url.to_string(),
                healthy: false,
                last_check: Utc::now(),
                response_time: elapsed,
                fail_count,
            }
        };

        self.store
            .hash_set(HEALTH_HASH, url, &serde_json::to_string(&record)?)?;
        Ok(record)
    }

    /// Probe every known URL once. Probes run concurrently; a given URL has
    /// at most one in-flight probe per cycle. Returns how many URLs were
    /// checked.
    pub async fn check_all(&self) -> usize {
        let urls = match self.known_urls() {
            Ok(urls) => urls,
            Err(error) => {
                tracing::error!(%error, "Health cycle skipped: cannot enumerate known URLs");
                return 0;
            }
        };

        let checks = urls.iter().map(|url| self.check_url(url));
        for (url, outcome) in urls.iter().zip(futures::future::join_all(checks).await) {
            if let Err(error) = outcome {
                tracing::error!(%url, %error, "Failed to persist probe outcome");
            }
        }
        urls.len()
    }

    /// Start the periodic probe task. Returns a handle that resolves when
    /// the task observes cancellation.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(self.config.interval_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(interval_ms = self.config.interval_ms, "Health checker started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health checker shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let checked = self.check_all().await;
                        tracing::debug!(checked, "Health cycle completed");
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ProbeHealth for HealthChecker {
    async fn check_url(&self, url: &str) -> Result<HealthRecord, HealthError> {
        HealthChecker::check_url(self, url).await
    }
}
