//! # Dispatcher Configuration
//!
//! Explicit, validated configuration for the dispatcher and its worker pool.
//!
//! Values are layered: built-in defaults, then an optional configuration file
//! (format inferred from the extension), then environment overrides such as
//! `CONNECTION_POOL__WORKER_COUNT=8` or
//! `CONNECTION_POOL__HEALTH_MONITOR__GRACE_INTERVAL_MS=5000`.
//!
//! ```rust,no_run
//! use connection_pool::config::DispatcherConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatcherConfig::load(Some("config/dispatcher.toml".as_ref()))?;
//! println!("workers: {}", config.worker_count);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{defaults, env};
use crate::error::{DispatchError, Result};

/// Root configuration for a [`Dispatcher`](crate::dispatch::Dispatcher)
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Connection string handed verbatim to the connector
    pub auth_string: String,

    /// Number of workers, each owning one connection
    pub worker_count: usize,

    /// Run the liveness watchdog
    pub enable_health_monitor: bool,

    /// Keep running totals of processed requests and commands
    pub enable_stat_counters: bool,

    /// Watchdog cadence
    pub health_monitor: HealthMonitorConfig,

    /// Per-statement deadline; `None` lets statements run indefinitely
    pub statement_timeout_ms: Option<u64>,

    /// Upper bound on joining workers during shutdown
    pub shutdown_timeout_ms: u64,
}

/// Health monitor cadence
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Idle period before every worker is challenged
    pub challenge_interval_ms: u64,

    /// Time a challenged worker has to acknowledge
    pub grace_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            auth_string: String::new(),
            worker_count: defaults::WORKER_COUNT,
            enable_health_monitor: defaults::ENABLE_HEALTH_MONITOR,
            enable_stat_counters: defaults::ENABLE_STAT_COUNTERS,
            health_monitor: HealthMonitorConfig::default(),
            statement_timeout_ms: None,
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            challenge_interval_ms: defaults::CHALLENGE_INTERVAL_MS,
            grace_interval_ms: defaults::GRACE_INTERVAL_MS,
        }
    }
}

// The auth string usually carries a password
impl std::fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("auth_string", &"[REDACTED]")
            .field("worker_count", &self.worker_count)
            .field("enable_health_monitor", &self.enable_health_monitor)
            .field("enable_stat_counters", &self.enable_stat_counters)
            .field("health_monitor", &self.health_monitor)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .finish()
    }
}

impl DispatcherConfig {
    /// Create a configuration with defaults for everything but the auth string
    pub fn new(auth_string: impl Into<String>) -> Self {
        Self {
            auth_string: auth_string.into(),
            ..Self::default()
        }
    }

    /// Load configuration from an optional file plus process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration with an explicit environment map
    ///
    /// Passing `Some(vars)` replaces the process environment as the override
    /// source, which keeps tests independent of global state.
    pub fn load_with_env(
        path: Option<&Path>,
        vars: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading dispatcher configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env::CONFIG_PREFIX)
                .prefix_separator(env::CONFIG_SEPARATOR)
                .separator(env::CONFIG_SEPARATOR)
                .try_parsing(true)
                .source(vars),
        );

        let config: DispatcherConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(config = ?config, "Dispatcher configuration loaded");
        Ok(config)
    }

    /// Reject configurations the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth_string.trim().is_empty() {
            return Err(DispatchError::configuration("auth_string must not be empty"));
        }

        if self.worker_count == 0 {
            return Err(DispatchError::configuration(
                "worker_count must be greater than 0",
            ));
        }

        if self.health_monitor.challenge_interval_ms == 0
            || self.health_monitor.grace_interval_ms == 0
        {
            return Err(DispatchError::configuration(
                "health monitor intervals must be greater than 0",
            ));
        }

        if self.statement_timeout_ms == Some(0) {
            return Err(DispatchError::configuration(
                "statement_timeout_ms must be greater than 0 when set",
            ));
        }

        Ok(())
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl HealthMonitorConfig {
    pub fn challenge_interval(&self) -> Duration {
        Duration::from_millis(self.challenge_interval_ms)
    }

    pub fn grace_interval(&self) -> Duration {
        Duration::from_millis(self.grace_interval_ms)
    }
}
