//! End-to-end request execution.
//!
//! Resolves the session binding, forwards the JSON-RPC payload to the
//! pinned upstream, feeds failures back into the health model, and shapes
//! the reply for the client.

mod error;
mod format;

pub use error::ExecuteError;
pub use format::{format_response, hex_to_decimal};

use crate::health::ProbeHealth;
use crate::session::{Session, SessionStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout for a forwarded call. Probes have their own, much shorter one.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Forwards JSON-RPC calls through session-pinned upstreams.
pub struct Executor {
    sessions: Arc<SessionStore>,
    prober: Arc<dyn ProbeHealth>,
    client: reqwest::Client,
}

impl Executor {
    /// Create an executor with a default forwarding client.
    pub fn new(sessions: Arc<SessionStore>, prober: Arc<dyn ProbeHealth>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build forwarding HTTP client");
        Self {
            sessions,
            prober,
            client,
        }
    }

    /// Create an executor with a custom client (for testing).
    pub fn with_client(
        sessions: Arc<SessionStore>,
        prober: Arc<dyn ProbeHealth>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            sessions,
            prober,
            client,
        }
    }

    /// Forward `payload` for `chain_id`, reusing or creating the session
    /// binding, and return the formatted reply.
    pub async fn execute(
        &self,
        chain_id: u64,
        payload: Value,
        session_id: Option<&str>,
    ) -> Result<Value, ExecuteError> {
        let session = self.resolve_session(chain_id, session_id).await?;
        let started = Instant::now();

        let outcome = self.client.post(&session.url).json(&payload).send().await;
        let duration = started.elapsed().as_secs_f64();

        match outcome {
            Ok(response) if response.status().is_success() => {
                metrics::counter!("conduit_forwards_total",
                    "chain" => chain_id.to_string(),
                    "status" => "ok"
                )
                .increment(1);
                metrics::histogram!("conduit_forward_duration_seconds").record(duration);

                let reply = response.json::<Value>().await.unwrap_or(Value::Null);
                let session = self.sessions.touch(&session)?;
                Ok(format_response(reply, &session.id))
            }
            Ok(response) => {
                let status = response.status();
                tracing::warn!(
                    chain_id,
                    url = %session.url,
                    %status,
                    "Upstream answered with an error status, demoting"
                );
                metrics::counter!("conduit_forwards_total",
                    "chain" => chain_id.to_string(),
                    "status" => "upstream_error"
                )
                .increment(1);

                self.demote(&session.url).await;

                // A decodable JSON-RPC error body still belongs to the
                // client; only an undecodable reply is the router's failure.
                match response.json::<Value>().await {
                    Ok(body) => Ok(format_response(body, &session.id)),
                    Err(_) => Err(ExecuteError::NoHealthyRpc(chain_id)),
                }
            }
            Err(error) => {
                tracing::warn!(
                    chain_id,
                    url = %session.url,
                    %error,
                    "Forwarded call failed in transport, demoting"
                );
                metrics::counter!("conduit_forwards_total",
                    "chain" => chain_id.to_string(),
                    "status" => "transport_error"
                )
                .increment(1);

                self.demote(&session.url).await;
                Err(ExecuteError::NoHealthyRpc(chain_id))
            }
        }
    }

    /// Work out which session backs this request.
    ///
    /// A supplied id must resolve; a resolved session on a different chain
    /// is torn down and replaced (the returned session carries the new id).
    async fn resolve_session(
        &self,
        chain_id: u64,
        session_id: Option<&str>,
    ) -> Result<Session, ExecuteError> {
        let Some(id) = session_id else {
            return Ok(self.sessions.create(chain_id).await?);
        };

        match self.sessions.get(id)? {
            Some(session) if session.chain_id == chain_id => Ok(session),
            Some(session) => {
                tracing::debug!(
                    session_id = id,
                    old_chain = session.chain_id,
                    new_chain = chain_id,
                    "Chain switch detected, rebinding session"
                );
                self.sessions.remove(&session.id)?;
                Ok(self.sessions.create(chain_id).await?)
            }
            None => Err(ExecuteError::InvalidSession(id.to_string())),
        }
    }

    /// Force a probe of a misbehaving upstream so its record reflects the
    /// failure immediately.
    async fn demote(&self, url: &str) {
        if let Err(error) = self.prober.check_url(url).await {
            tracing::error!(url, %error, "Post-failure probe could not be recorded");
        }
    }
}
