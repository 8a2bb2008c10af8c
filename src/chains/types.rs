//! Chain configuration records.

use serde::{Deserialize, Serialize};

/// Store-key prefix under which chain configurations live.
pub const CHAIN_KEY_PREFIX: &str = "chain:";

/// Store key for one chain's configuration.
pub fn chain_key(chain_id: u64) -> String {
    format!("chain:{chain_id}")
}

/// One chain of the configuration file: a logical group of upstream URLs
/// that all serve the same blockchain.
///
/// Replaced wholesale on every reload; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub urls: Vec<String>,
}

/// Top-level schema of the chain configuration file.
#[derive(Debug, Deserialize)]
pub(crate) struct ChainsFile {
    pub chains: Vec<ChainConfig>,
}

impl ChainConfig {
    /// Drop duplicate URLs, keeping the first occurrence's position.
    pub(crate) fn dedup_urls(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.urls.retain(|url| seen.insert(url.clone()));
    }
}
