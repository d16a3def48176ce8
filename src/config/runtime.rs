//! Catch-up runtime configuration.

use std::time::Duration;

use backon::ExponentialBuilder;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of events fetched per round trip to the log.
    pub batch_size: usize,
    /// Wake-up interval when no push notification arrives.
    pub poll_interval_ms: u64,
    /// Wait between attempts to acquire the catch-up lease.
    pub lease_retry_ms: u64,
    /// Backoff for transient store errors.
    pub retry: RetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            poll_interval_ms: 1_000,
            lease_retry_ms: 1_000,
            retry: RetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease_retry(&self) -> Duration {
        Duration::from_millis(self.lease_retry_ms)
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_times: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 10,
            max_delay_ms: 2_000,
            max_times: 10,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> ExponentialBuilder {
        crate::utils::retry::exponential(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_times,
        )
    }
}
