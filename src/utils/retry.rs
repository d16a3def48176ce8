//! Backoff builders for transient storage failures.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Exponential backoff with jitter between `min_delay` and `max_delay`.
pub fn exponential(min_delay: Duration, max_delay: Duration, max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(min_delay)
        .with_max_delay(max_delay)
        .with_max_times(max_times)
        .with_jitter()
}

/// Backoff for connecting to the store at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    exponential(Duration::from_millis(100), Duration::from_secs(5), 30)
}
