use async_trait::async_trait;

use crate::error::DatabaseError;

/// Opens connections for worker slots.
///
/// One connector is shared by the whole pool; each call to [`connect`]
/// must return an independent connection that will be owned by exactly one
/// worker for its lifetime.
///
/// [`connect`]: Connector::connect
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self, auth: &str) -> Result<Self::Connection, DatabaseError>;
}

/// A single live database connection.
///
/// Commands run in auto-commit fashion: the worker calls [`execute`] and then
/// [`commit`] for every command it dequeues. Implementations report failures
/// that leave the connection unusable as [`DatabaseError::ConnectionLost`] so
/// the worker replaces it.
///
/// [`execute`]: Connection::execute
/// [`commit`]: Connection::commit
#[async_trait]
pub trait Connection: Send + 'static {
    /// Opaque result of a successful command, passed through to the caller
    type Rows: Send + 'static;

    async fn execute(&mut self, command: &str) -> Result<Self::Rows, DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;
}

/// Row set type produced by a connector's connections
pub type RowsOf<C> = <<C as Connector>::Connection as Connection>::Rows;
