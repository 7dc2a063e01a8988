//! Client metrics
//!
//! Per-operation counters, an exponential moving average of latency
//! (α = 0.1), and error counts by code.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Weight of the newest sample in the latency average
const EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetrics {
    pub count: u64,
    pub errors: u64,
    pub average_latency_ms: f64,
}

impl OperationMetrics {
    fn record(&mut self, latency_ms: f64, failed: bool) {
        self.average_latency_ms = ema(self.average_latency_ms, latency_ms, self.count);
        self.count += 1;
        if failed {
            self.errors += 1;
        }
    }
}

/// Point-in-time copy of the client metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    /// `total_errors / total_requests`, 0 before the first request
    pub error_rate: f64,
    pub average_latency_ms: f64,
    pub operations: BTreeMap<String, OperationMetrics>,
    pub errors_by_code: BTreeMap<String, u64>,
}

/// Thread-safe metrics collector
#[derive(Debug, Default)]
pub struct ClientMetrics {
    state: Mutex<MetricsSnapshot>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call; `error_code` is set when it failed
    pub fn record(&self, operation: &str, latency: Duration, error_code: Option<&str>) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let mut state = self.state.lock();

        state.average_latency_ms = ema(state.average_latency_ms, latency_ms, state.total_requests);
        state.total_requests += 1;
        if let Some(code) = error_code {
            state.total_errors += 1;
            *state.errors_by_code.entry(code.to_string()).or_insert(0) += 1;
        }
        state.error_rate = state.total_errors as f64 / state.total_requests as f64;

        state
            .operations
            .entry(operation.to_string())
            .or_default()
            .record(latency_ms, error_code.is_some());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().clone()
    }
}

/// The first sample seeds the average
fn ema(current: f64, sample: f64, samples_so_far: u64) -> f64 {
    if samples_so_far == 0 {
        sample
    } else {
        EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * current
    }
}
