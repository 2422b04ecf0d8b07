//! Download manager configuration.

use std::time::Duration;

/// Default pool capacity.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
/// Default bytes written per cooperative iteration.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
/// Free space below this triggers a warning at admission.
pub const DEFAULT_LOW_SPACE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Configuration for creating a download manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadManagerConfig {
    /// Maximum concurrent transfers (pool capacity K).
    pub max_concurrent: usize,
    pub chunk_size: usize,
    /// Minimum wall time between progress notifications of one task.
    pub progress_interval: Duration,
    pub low_space_threshold: u64,
    /// Bounded wait for workers to drain during shutdown.
    pub shutdown_timeout: Duration,
    /// Automatic retries for network errors and timeouts. 0 disables retry.
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: Duration::from_millis(100),
            low_space_threshold: DEFAULT_LOW_SPACE_THRESHOLD,
            shutdown_timeout: Duration::from_secs(5),
            max_retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl DownloadManagerConfig {
    /// Set the pool capacity. Values below 1 are raised to 1.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = if max == 0 { 1 } else { max };
        self
    }

    /// Set the chunk size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = if size == 0 { 1 } else { size };
        self
    }

    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_low_space_threshold(mut self, bytes: u64) -> Self {
        self.low_space_threshold = bytes;
        self
    }

    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }
}
