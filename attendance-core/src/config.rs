//! Library configuration types
//!
//! Only the knobs the core needs live here. File locations, reader library names
//! and the rest of the operator-facing configuration belong to the application layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum number of seconds between two accepted attendance entries for a person
pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

/// Delay between two reader polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Configuration for the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cooldown window for repeated attendance (default: 60s)
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: i64,
}

fn default_cooldown() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the cooldown window
    pub fn with_cooldown_secs(mut self, secs: i64) -> Self {
        self.cooldown_secs = secs.max(0);
        self
    }
}

/// Configuration for the presence tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Delay between polls in milliseconds (default: 500ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the poll interval
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(StoreConfig::new().cooldown_secs, 60);
        assert_eq!(TrackerConfig::new().poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_builders() {
        let store = StoreConfig::new().with_cooldown_secs(-5);
        assert_eq!(store.cooldown_secs, 0);

        let tracker = TrackerConfig::new().with_poll_interval_ms(0);
        assert_eq!(tracker.poll_interval(), Duration::ZERO);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let store: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(store, StoreConfig::default());
    }
}
