//! Running totals of processed requests and fire-and-forget commands.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Atomic counters shared by the dispatcher, its workers and the monitor
#[derive(Debug)]
pub struct DispatchStats {
    started_at: DateTime<Utc>,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
    commands_submitted: AtomicU64,
    commands_executed: AtomicU64,
    commands_failed: AtomicU64,
    worker_restarts: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    /// Tracked requests whose result was delivered to a caller
    pub requests_completed: u64,
    /// Tracked requests delivered to a caller as an error
    pub requests_failed: u64,
    /// Fire-and-forget commands accepted by the queue
    pub commands_submitted: u64,
    pub commands_executed: u64,
    pub commands_failed: u64,
    pub worker_restarts: u64,
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            requests_completed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            commands_submitted: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            worker_restarts: AtomicU64::new(0),
        }
    }
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, succeeded: bool) {
        if succeeded {
            self.requests_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_command_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self, succeeded: bool) {
        if succeeded {
            self.commands_executed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.commands_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_restart(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// JSON rendering for log sinks and exporters
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
