//! Retry policy
//!
//! Exponential backoff with optional jitter, shared by the store adapter
//! (engine throttling) and the client (transport failures).
//!
//! ```text
//!   delay(n) = min(base * 2^(n-1), max)            n = 1, 2, ...
//!   jittered = delay(n) * U[0.5, 1.0]              when jitter is on
//! ```

use std::thread;
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::error::{PathKvError, Result};

/// Lower bound of the jitter factor (jittered delay is 50%..=100%)
const JITTER_MIN_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::MAX,
            jitter: false,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::exponential(0, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Un-jittered delay before retry number `retry` (1-based)
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() || retry == 0 {
            return Duration::ZERO;
        }
        let shift = (retry - 1).min(31);
        let factor = 1u128 << shift;
        let scaled = self.base_delay.as_millis().saturating_mul(factor);
        let raw = Duration::from_millis(scaled.min(u128::from(u64::MAX)) as u64);
        raw.min(self.max_delay)
    }

    /// Delay before retry number `retry`, with jitter applied if enabled
    pub fn delay_for(&self, retry: u32) -> Duration {
        let bounded = self.base_delay_for(retry);
        if !self.jitter || bounded.is_zero() {
            return bounded;
        }
        let factor = thread_rng().gen_range(JITTER_MIN_FACTOR..=1.0);
        Duration::from_millis((bounded.as_millis() as f64 * factor).round() as u64)
    }

    pub fn handle(&self) -> RetryHandle {
        RetryHandle {
            policy: self.clone(),
            retries: 0,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up
    ///
    /// `op` receives the 0-based attempt number. Sleeps between attempts.
    pub fn run<T, F, P>(&self, label: &str, should_retry: P, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
        P: Fn(&PathKvError) -> bool,
    {
        let mut handle = self.handle();
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if should_retry(&e) => match handle.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "{} failed (attempt {}): {}; retrying in {:?}",
                            label,
                            attempt + 1,
                            e,
                            delay
                        );
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Tracks retries for a single logical call
pub struct RetryHandle {
    policy: RetryPolicy,
    retries: u32,
}

impl RetryHandle {
    /// Delay before the next retry, or `None` if retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.policy.delay_for(self.retries))
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}
