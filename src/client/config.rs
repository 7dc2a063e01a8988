//! Client configuration

use std::time::Duration;

use crate::path::PathValidationConfig;
use crate::retry::RetryPolicy;

/// Settings for a [`super::Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Retry
    // -------------------------------------------------------------------------
    /// Retries after the first attempt
    pub max_retries: u32,

    /// First backoff delay
    pub base_delay: Duration,

    /// Backoff cap
    pub max_delay: Duration,

    /// Randomize each delay to 50-100% of its computed value
    pub jitter: bool,

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------
    /// Per-call timeout
    pub timeout: Duration,

    /// Max pooled transport connections
    pub pool_size: usize,

    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,

    // -------------------------------------------------------------------------
    // Behaviour
    // -------------------------------------------------------------------------
    /// Log errors that `read_with_default` swallows
    pub log_suppressed_errors: bool,

    /// Client-side path checks (should match the server)
    pub path: PathValidationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: true,
            timeout: Duration::from_secs(30),
            pool_size: 10,
            acquire_timeout: Duration::from_secs(5),
            log_suppressed_errors: true,
            path: PathValidationConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, self.base_delay)
            .with_max_delay(self.max_delay)
            .with_jitter(self.jitter)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    pub fn log_suppressed_errors(mut self, log: bool) -> Self {
        self.config.log_suppressed_errors = log;
        self
    }

    pub fn path_validation(mut self, path: PathValidationConfig) -> Self {
        self.config.path = path;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
