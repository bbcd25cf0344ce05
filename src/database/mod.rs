//! # Database Boundary
//!
//! The dispatcher treats the database driver as an external collaborator that
//! can open a connection, execute a command on it and commit. This module
//! defines that boundary as the [`Connector`] and [`Connection`] traits.
//!
//! ## Key Components
//!
//! - [`connection`] - Collaborator traits and the [`RowsOf`] alias
//! - [`postgres`] - PostgreSQL adapter over a single `sqlx::PgConnection`
//!   (feature `postgres`, enabled by default)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use connection_pool::config::DispatcherConfig;
//! use connection_pool::database::postgres::PgConnector;
//! use connection_pool::dispatch::Dispatcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatcherConfig::new("postgres://postgres@localhost/app");
//! let dispatcher = Dispatcher::start(PgConnector, config).await?;
//!
//! let rows = dispatcher.submit("select * from servers limit {}", &[&10]).await?;
//! println!("{} rows", rows.len());
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use connection::{Connection, Connector, RowsOf};
