//! Pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for pipeline behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of events each consumer may handle at once.
    pub concurrency: usize,
    /// Crashed attempts retried after the first one.
    pub max_retries: u32,
    /// Fixed pause between a crashed attempt and the next one (milliseconds).
    pub retry_backoff_ms: u64,
    /// Idle poll interval of every event queue (milliseconds).
    pub poll_delay_ms: u64,
    /// Names longer than this count as long names in statistics.
    pub name_length_threshold: usize,
    /// Jobs with more arguments than this count as argument-heavy in statistics.
    pub args_count_threshold: usize,
    /// Interval of the supervisor's housekeeping tick (milliseconds).
    pub tick_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_retries: 2,
            retry_backoff_ms: 3000,
            poll_delay_ms: 100,
            name_length_threshold: 5,
            args_count_threshold: 2,
            tick_interval_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Total attempts a job gets before it is declared crashed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Set the concurrency of every consumer. Zero runs as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the retry policy.
    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// Set the idle poll interval.
    pub fn with_poll_delay(mut self, poll_delay_ms: u64) -> Self {
        self.poll_delay_ms = poll_delay_ms;
        self
    }
}
