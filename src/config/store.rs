//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Location of the durable store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("conduit.db"),
        }
    }
}
