//! Polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the job polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status polls (milliseconds).
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Give up after this many status polls.
    /// Unset means no attempt limit (the duration limit still applies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Give up once the job has been polling for this long (seconds).
    #[serde(
        default = "default_max_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration_secs: Option<u64>,
}

fn default_interval() -> u64 {
    2000 // 2 seconds
}

fn default_max_duration() -> Option<u64> {
    Some(3600) // 1 hour
}

impl PollingConfig {
    /// Delay between polls.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Maximum time spent polling, if bounded.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            max_attempts: None,
            max_duration_secs: default_max_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollingConfig::default();
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(config.interval(), Duration::from_secs(2));
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.max_duration(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: PollingConfig = toml::from_str("").unwrap();
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(config.max_duration_secs, Some(3600));
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            interval_ms = 250
            max_attempts = 40
            max_duration_secs = 120
        "#;
        let config: PollingConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.max_attempts, Some(40));
        assert_eq!(config.max_duration(), Some(Duration::from_secs(120)));
    }
}
