//! # System Constants
//!
//! Defaults and environment variable names that define the operational
//! boundaries of the dispatcher.

/// Pool sizing and watchdog defaults
pub mod defaults {
    /// Number of workers (and therefore connections) when not configured
    pub const WORKER_COUNT: usize = 4;

    /// Idle period before the health monitor challenges every worker
    pub const CHALLENGE_INTERVAL_MS: u64 = 60_000;

    /// Time a challenged worker has to acknowledge before it is restarted
    pub const GRACE_INTERVAL_MS: u64 = 40_000;

    /// Upper bound on joining workers during shutdown
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

    pub const ENABLE_HEALTH_MONITOR: bool = true;

    pub const ENABLE_STAT_COUNTERS: bool = false;
}

/// Environment variables consulted by configuration and logging
pub mod env {
    /// Prefix for configuration overrides, e.g. `CONNECTION_POOL__WORKER_COUNT=8`
    pub const CONFIG_PREFIX: &str = "CONNECTION_POOL";

    /// Separator between the prefix and nested keys
    pub const CONFIG_SEPARATOR: &str = "__";

    /// Deployment environment (`development`, `test`, `production`)
    pub const ENVIRONMENT: &str = "CONNECTION_POOL_ENV";

    /// Set to `json` for machine-readable log output
    pub const LOG_FORMAT: &str = "CONNECTION_POOL_LOG_FORMAT";
}

/// Reserved request identifiers
pub mod ids {
    /// Id carried by fire-and-forget commands; never tracked
    pub const UNTRACKED: u64 = 0;

    /// First id handed out to a tracked request
    pub const FIRST_TRACKED: u64 = 1;
}
