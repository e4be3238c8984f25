//! Settings that control how items are synced.

use std::time::Duration;

/// The config for the sync loop and the poll job.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// The number of transactions to request per page, between 1 and 500.
    pub page_size: u32,
    /// How long to wait for a single page before treating the request as failed.
    pub request_timeout: Duration,
    /// How many times to retry a page after a transient failure.
    pub max_retries: u32,
    /// The delay before the first retry. Each further retry doubles it.
    pub initial_backoff: Duration,
    /// The upper bound on the delay between retries.
    pub max_backoff: Duration,
    /// How many times pagination may start over after the item changed
    /// mid-sync.
    pub max_restarts: u32,
    /// How often the poll job syncs every connection, `None` to disable it.
    pub poll_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_restarts: 3,
            poll_interval: Some(Duration::from_secs(6 * 60 * 60)),
        }
    }
}

impl SyncConfig {
    /// The delay before retry number `attempt`, starting from 1.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));

        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
