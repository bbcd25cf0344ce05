//! # PostgreSQL Adapter
//!
//! Connector over a single, unpooled `sqlx::PgConnection` per worker slot.
//! Every command runs in its own transaction: the first `execute` after a
//! commit opens one with `BEGIN`, `commit` closes it with `COMMIT`, and a
//! failed statement rolls it back before the error is returned.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection as _, Executor};
use tracing::{debug, warn};

use super::connection::{Connection, Connector};
use crate::error::DatabaseError;

/// Opens PostgreSQL connections from a libpq-style URL
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

/// One live PostgreSQL connection owned by a worker
#[derive(Debug)]
pub struct PgConnection {
    inner: sqlx::PgConnection,
    in_transaction: bool,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DatabaseError::connection_lost(err.to_string()),
            other => DatabaseError::execution(other.to_string()),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self, auth: &str) -> Result<PgConnection, DatabaseError> {
        let inner = sqlx::PgConnection::connect(auth).await?;
        debug!("🐘 POSTGRES: Connection established");
        Ok(PgConnection {
            inner,
            in_transaction: false,
        })
    }
}

impl PgConnection {
    async fn rollback(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        if let Err(e) = (&mut self.inner).execute("ROLLBACK").await {
            warn!(error = %e, "🐘 POSTGRES: Rollback after failed statement did not succeed");
        }
    }
}

#[async_trait]
impl Connection for PgConnection {
    type Rows = Vec<PgRow>;

    async fn execute(&mut self, command: &str) -> Result<Vec<PgRow>, DatabaseError> {
        if !self.in_transaction {
            (&mut self.inner).execute("BEGIN").await?;
            self.in_transaction = true;
        }

        match sqlx::query(command).fetch_all(&mut self.inner).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let err = DatabaseError::from(e);
                if !err.is_connection_lost() {
                    self.rollback().await;
                }
                Err(err)
            }
        }
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        (&mut self.inner).execute("COMMIT").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_connection_lost() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(DatabaseError::from(sqlx::Error::Io(io)).is_connection_lost());
        assert!(DatabaseError::from(sqlx::Error::PoolClosed).is_connection_lost());
    }

    #[test]
    fn statement_failures_are_execution_errors() {
        let err = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::Execution { .. }));
    }
}
