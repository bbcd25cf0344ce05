#![allow(dead_code)]

pub mod strategies;

use connection_pool::test_utils::MemoryConnector;
use connection_pool::{Dispatcher, DispatcherConfig, HealthMonitorConfig};

/// Config with a short challenge interval so tests finish quickly.
///
/// The grace interval stays well above the longest `sleep` used in tests so
/// the monitor never mistakes a slow statement for a stuck one.
pub fn fast_config(workers: usize) -> DispatcherConfig {
    DispatcherConfig {
        worker_count: workers,
        enable_stat_counters: true,
        health_monitor: HealthMonitorConfig {
            challenge_interval_ms: 50,
            grace_interval_ms: 400,
        },
        shutdown_timeout_ms: 500,
        ..DispatcherConfig::new("memory://test")
    }
}

pub async fn start_dispatcher(
    workers: usize,
) -> (Dispatcher<MemoryConnector>, MemoryConnector) {
    start_with(fast_config(workers)).await
}

pub async fn start_with(
    config: DispatcherConfig,
) -> (Dispatcher<MemoryConnector>, MemoryConnector) {
    let connector = MemoryConnector::new();
    let dispatcher = Dispatcher::start(connector.clone(), config)
        .await
        .expect("dispatcher should start");
    (dispatcher, connector)
}
