use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[client]` section of `strata.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seconds a level's data stays fresh unless its route says otherwise
    pub default_stale_time_secs: u64,
    /// Scroll positions remembered per session
    pub scroll_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_stale_time_secs: default_stale_time_secs(),
            scroll_capacity: default_scroll_capacity(),
        }
    }
}

impl ClientConfig {
    pub fn default_stale_time(&self) -> Duration {
        Duration::from_secs(self.default_stale_time_secs)
    }
}

fn default_stale_time_secs() -> u64 {
    60
}

fn default_scroll_capacity() -> usize {
    crate::scroll::DEFAULT_SCROLL_CAPACITY
}
