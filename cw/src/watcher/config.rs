//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the UpdateWatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Seconds to wait after a pass that found nothing new
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Search options offered per query
    #[serde(rename = "max-search-results", default = "default_max_search_results")]
    pub max_search_results: usize,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_search_results() -> usize {
    crate::booru::DEFAULT_TOP_N
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_search_results: default_max_search_results(),
        }
    }
}

impl WatcherConfig {
    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
