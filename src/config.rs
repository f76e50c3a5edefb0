// src/config.rs

//! Tracker configuration
//!
//! The tracker namespace of the indexer configuration. Loading and
//! merging configuration files is the embedding application's concern;
//! this type only defines the shape and the defaults.

use serde::{Deserialize, Serialize};

/// Configuration for one tracker invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Process only the repositories with these names (highest precedence)
    pub repositories_names: Vec<String>,

    /// Process all repositories of these kinds (used when no names given)
    pub repositories_kinds: Vec<String>,

    /// Process repositories even when the remote digest is unchanged
    pub bypass_digest_check: bool,

    /// Number of repositories tracked in parallel
    pub num_workers: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repositories_names: Vec::new(),
            repositories_kinds: Vec::new(),
            bypass_digest_check: false,
            num_workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
