//! In-memory execution metrics.
//!
//! Counters are observed by operators through the metrics endpoint but
//! never consulted by control flow.  All mutations are serialized behind
//! one mutex; the one-minute throughput window is pruned on each record.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use serde::Serialize;

#[derive(Default)]
struct Counters {
    total: u64,
    succeeded: u64,
    failed: u64,
    total_duration_ms: u64,
    /// Timestamps of executions within the last minute.
    window: Vec<DateTime<Utc>>,
}

/// Process-wide execution counters.
#[derive(Default)]
pub struct Metrics {
    inner: Mutex<Counters>,
}

/// Point-in-time view, serialized straight onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_tasks_executed: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate_percent: f64,
    pub average_execution_ms: u64,
    pub tasks_per_minute: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed firing.
    pub fn record(&self, duration: Duration, success: bool) {
        self.record_at(Utc::now(), duration, success);
    }

    fn record_at(&self, now: DateTime<Utc>, duration: Duration, success: bool) {
        let mut inner = self.inner.lock().unwrap();

        inner.total += 1;
        inner.total_duration_ms += duration.as_millis() as u64;
        if success {
            inner.succeeded += 1;
        } else {
            inner.failed += 1;
        }

        let cutoff = now - TimeDelta::seconds(60);
        inner.window.push(now);
        inner.window.retain(|t| *t > cutoff);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();

        let success_rate_percent = if inner.total > 0 {
            inner.succeeded as f64 / inner.total as f64 * 100.0
        } else {
            0.0
        };
        let average_execution_ms = if inner.total > 0 {
            inner.total_duration_ms / inner.total
        } else {
            0
        };

        MetricsSnapshot {
            total_tasks_executed: inner.total,
            successful_tasks: inner.succeeded,
            failed_tasks: inner.failed,
            success_rate_percent,
            average_execution_ms,
            tasks_per_minute: inner.window.len() as f64,
        }
    }
}
