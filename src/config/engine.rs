use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schema engine tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// How long SQLite waits on a locked database before giving up.
    /// TOML: `engine.busy_timeout_secs`. Default: `5`.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,

    /// Extra attempts after a schema conflict (a concurrent writer created the same
    /// table/column first). TOML: `engine.conflict_retry_max_times`. Default: `3`.
    #[serde(default = "default_conflict_retry_max_times")]
    pub conflict_retry_max_times: usize,

    /// TOML: `engine.conflict_retry_min_delay_ms`. Default: `10`.
    #[serde(default = "default_conflict_retry_min_delay_ms")]
    pub conflict_retry_min_delay_ms: u64,

    /// TOML: `engine.conflict_retry_max_delay_ms`. Default: `200`.
    #[serde(default = "default_conflict_retry_max_delay_ms")]
    pub conflict_retry_max_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_timeout_secs: default_busy_timeout_secs(),
            conflict_retry_max_times: default_conflict_retry_max_times(),
            conflict_retry_min_delay_ms: default_conflict_retry_min_delay_ms(),
            conflict_retry_max_delay_ms: default_conflict_retry_max_delay_ms(),
        }
    }
}

impl EngineConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    /// Backoff used when a request loses a schema race.
    pub fn conflict_retry_policy(&self) -> ExponentialBuilder {
        let min_delay = Duration::from_millis(self.conflict_retry_min_delay_ms);
        ExponentialBuilder::default()
            .with_min_delay(min_delay)
            .with_max_delay(Duration::from_millis(self.conflict_retry_max_delay_ms).max(min_delay))
            .with_max_times(self.conflict_retry_max_times)
            .with_jitter()
    }
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_conflict_retry_max_times() -> usize {
    3
}

fn default_conflict_retry_min_delay_ms() -> u64 {
    10
}

fn default_conflict_retry_max_delay_ms() -> u64 {
    200
}
