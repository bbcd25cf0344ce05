//! # Health Monitoring
//!
//! Liveness watchdog for the worker pool.
//!
//! Each cycle waits out the challenge interval, raises every slot's liveness
//! flag, waits out the grace interval and then restarts every slot whose flag
//! is still raised (the worker never returned to idle, so it is presumed stuck
//! in a statement) or whose worker task has ended. Workers make blocking
//! network calls without a built-in deadline, so this is the pool's backstop
//! against a hung connection permanently removing capacity.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::pool::{RestartOutcome, WorkerPool};
use crate::config::HealthMonitorConfig;
use crate::database::Connector;

/// Outcome of one inspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub cycle: u64,
    pub slots_checked: usize,
    /// Slots that were replaced with a fresh worker
    pub restarted: Vec<usize>,
    /// Slots that answered the challenge before they could be restarted
    pub recovered: Vec<usize>,
    /// Slots whose replacement could not be started this cycle
    pub failed: Vec<usize>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.restarted.is_empty() && self.failed.is_empty()
    }
}

pub struct HealthMonitor<C: Connector> {
    dispatcher_id: Uuid,
    pool: Arc<WorkerPool<C>>,
    challenge_interval: Duration,
    grace_interval: Duration,
    shutdown: Arc<Notify>,
    cycle: u64,
}

impl<C: Connector> HealthMonitor<C> {
    pub fn new(
        dispatcher_id: Uuid,
        pool: Arc<WorkerPool<C>>,
        config: &HealthMonitorConfig,
        shutdown: Arc<Notify>,
    ) -> Self {
        info!(
            "🏥 HEALTH: Creating health monitor for dispatcher {} (challenge: {}ms, grace: {}ms)",
            dispatcher_id, config.challenge_interval_ms, config.grace_interval_ms
        );

        Self {
            dispatcher_id,
            pool,
            challenge_interval: config.challenge_interval(),
            grace_interval: config.grace_interval(),
            shutdown,
            cycle: 0,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run cycles until the shutdown notification fires
    pub async fn run(mut self) {
        loop {
            if !self.wait(self.challenge_interval).await {
                break;
            }
            self.pool.challenge_all();

            if !self.wait(self.grace_interval).await {
                break;
            }

            let report = self.inspect().await;
            if report.is_healthy() {
                debug!(
                    dispatcher_id = %self.dispatcher_id,
                    cycle = report.cycle,
                    "🏥 HEALTH: All {} workers responsive",
                    report.slots_checked
                );
            }
        }

        debug!(dispatcher_id = %self.dispatcher_id, "🏥 HEALTH: Monitor stopped");
    }

    /// Sleep for `duration`; false if shutdown was requested first
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.notified() => false,
        }
    }

    /// Restart every slot that did not answer the last challenge
    pub async fn inspect(&mut self) -> HealthReport {
        self.cycle += 1;
        let mut report = HealthReport {
            cycle: self.cycle,
            slots_checked: self.pool.worker_count(),
            ..HealthReport::default()
        };

        for index in self.pool.unresponsive_slots() {
            warn!(
                dispatcher_id = %self.dispatcher_id,
                worker = index,
                "🚨 HEALTH: Worker did not answer liveness challenge"
            );

            match self.pool.restart_slot(index).await {
                Ok(RestartOutcome::Restarted) => report.restarted.push(index),
                Ok(RestartOutcome::Recovered) => report.recovered.push(index),
                Err(e) => {
                    error!(
                        dispatcher_id = %self.dispatcher_id,
                        worker = index,
                        error = %e,
                        "❌ HEALTH: Could not restart worker, will retry next cycle"
                    );
                    report.failed.push(index);
                }
            }
        }

        report
    }
}
