#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Connection Pool
//!
//! Bounded worker pool that multiplexes database commands from many callers
//! onto a fixed set of persistent connections.
//!
//! ## Overview
//!
//! Callers submit parameterized command templates. The dispatcher formats
//! them, queues them on a single FIFO and hands them to `N` workers, each of
//! which owns exactly one connection. Results flow back to the caller that
//! asked for them through a per-request completion channel, so concurrent
//! callers never see each other's rows.
//!
//! Three ways to submit:
//!
//! - **Blocking** ([`Dispatcher::submit`]): wait for the rows
//! - **Non-blocking** ([`Dispatcher::submit_async`] + [`Dispatcher::await_result`]):
//!   get an id now, collect the rows later
//! - **Fire-and-forget** ([`Dispatcher::fire_and_forget`]): no result at all
//!
//! A health monitor challenges every worker periodically and replaces any
//! worker that fails to return to idle within the grace interval, reopening
//! its connection.
//!
//! ## Module Organization
//!
//! - [`dispatch`] - Queue, result store, workers, health monitor and the dispatcher
//! - [`database`] - Connection abstraction and the PostgreSQL adapter
//! - [`config`] - Dispatcher configuration (file + environment)
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - `test_utils` - In-memory connector for tests (`test-utils` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use connection_pool::{Dispatcher, DispatcherConfig, Literal};
//! use connection_pool::database::postgres::PgConnector;
//!
//! # async fn example() -> connection_pool::Result<()> {
//! connection_pool::logging::init_structured_logging();
//!
//! let mut config = DispatcherConfig::new("postgres://app@localhost/inventory");
//! config.worker_count = 8;
//!
//! let dispatcher = Dispatcher::start(PgConnector, config).await?;
//! let rows = dispatcher
//!     .submit("select * from hosts where name = {}", &[&Literal("db-01")])
//!     .await?;
//! println!("{} rows", rows.len());
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code; integration tests under `tests/` drive the
//! dispatcher through `test_utils::MemoryConnector` and need no database. The
//! module is compiled for unit tests and with the `test-utils` feature, which
//! the crate enables for its own integration tests and benches.
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod logging;

// In-memory connector (only available in test builds or with test feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{DispatcherConfig, HealthMonitorConfig};
pub use database::{Connection, Connector, RowsOf};
pub use dispatch::{
    format_command, Dispatcher, HealthReport, Literal, RequestId, StatsSnapshot,
};
pub use error::{DatabaseError, DispatchError, Result};
