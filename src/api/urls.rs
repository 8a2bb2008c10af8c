//! Operator projections: per-chain stats and URL details.

use crate::api::{ApiError, AppState};
use crate::chains::ChainConfig;
use crate::health::HealthRecord;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregate view of one chain's pool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    /// Live sessions bound to this chain
    pub total_sessions: usize,
    /// Configured URLs that have any health record
    pub active_urls: usize,
    /// Configured URLs currently eligible for traffic
    pub healthy_urls: usize,
    /// Mean round-trip over URLs with a record, milliseconds; 0 if none
    pub average_response_time: u64,
}

/// Per-URL health projection. Unprobed URLs show zeroed defaults.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlDetail {
    pub url: String,
    pub healthy: bool,
    pub fail_count: u32,
    pub response_time: u64,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub chain_id: u64,
    pub name: String,
    pub stats: ChainStats,
    pub urls: Vec<UrlDetail>,
}

#[derive(Debug, Deserialize)]
pub struct UrlsQuery {
    #[serde(rename = "chainId")]
    pub chain_id: Option<u64>,
}

/// GET /api/rpc/urls - Summaries for every configured chain (optionally
/// narrowed with `?chainId=`).
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlsQuery>,
) -> Result<Json<Value>, ApiError> {
    let health = state.checker.records()?;

    let mut summaries = Vec::new();
    for chain in state.registry.chains()? {
        if let Some(wanted) = query.chain_id {
            if chain.chain_id != wanted {
                continue;
            }
        }
        summaries.push(summarize(&state, &chain, &health)?);
    }

    Ok(Json(json!({
        "success": true,
        "data": { "chains": summaries },
    })))
}

/// GET /api/rpc/urls/{chainId} - Full detail for one chain.
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let chain = state
        .registry
        .get_chain(chain_id)?
        .ok_or_else(|| ApiError::not_found(format!("chain {chain_id} not found")))?;

    let health = state.checker.records()?;
    let summary = summarize(&state, &chain, &health)?;

    Ok(Json(json!({
        "success": true,
        "data": summary,
    })))
}

fn summarize(
    state: &AppState,
    chain: &ChainConfig,
    health: &HashMap<String, HealthRecord>,
) -> Result<ChainSummary, ApiError> {
    let max_fail_count = state.config.health_check.max_fail_count;

    let with_record: Vec<&HealthRecord> = chain
        .urls
        .iter()
        .filter_map(|url| health.get(url))
        .collect();

    let average_response_time = if with_record.is_empty() {
        0
    } else {
        with_record.iter().map(|r| r.response_time).sum::<u64>() / with_record.len() as u64
    };

    let stats = ChainStats {
        total_sessions: state.sessions.count_for_chain(chain.chain_id)?,
        active_urls: with_record.len(),
        healthy_urls: with_record
            .iter()
            .filter(|record| record.is_eligible(max_fail_count))
            .count(),
        average_response_time,
    };

    let now = Utc::now();
    let urls = chain
        .urls
        .iter()
        .map(|url| match health.get(url) {
            Some(record) => UrlDetail {
                url: url.clone(),
                healthy: record.healthy,
                fail_count: record.fail_count,
                response_time: record.response_time,
                last_check: record.last_check,
            },
            None => UrlDetail {
                url: url.clone(),
                healthy: false,
                fail_count: 0,
                response_time: 0,
                last_check: now,
            },
        })
        .collect();

    Ok(ChainSummary {
        chain_id: chain.chain_id,
        name: chain.name.clone(),
        stats,
        urls,
    })
}
