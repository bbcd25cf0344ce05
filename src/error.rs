//! # Dispatch Error Types
//!
//! Structured error handling for the dispatcher, the worker pool and the
//! database boundary using thiserror.

use std::time::Duration;

use thiserror::Error;

use crate::dispatch::RequestId;

/// Errors raised by a database collaborator.
///
/// Connectors and connections classify every failure into one of these two
/// kinds so a worker knows whether its connection is still usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Execution failed: {message}")]
    Execution { message: String },

    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },
}

impl DatabaseError {
    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create a connection lost error
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Whether the connection that produced this error must be discarded
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

/// Errors surfaced by the public dispatch API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Format error in '{template}': {reason}")]
    Format { template: String, reason: String },

    #[error("Unknown request id: {id}")]
    UnknownId { id: RequestId },

    #[error("Duplicate request id: {id}")]
    DuplicateId { id: RequestId },

    #[error("Execution error: {message}")]
    Execution { message: String },

    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    #[error("Statement timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Request {id} was abandoned before completion")]
    Abandoned { id: RequestId },

    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DispatchError {
    /// Create a format error
    pub fn format(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown id error
    pub fn unknown_id(id: RequestId) -> Self {
        Self::UnknownId { id }
    }

    /// Create a duplicate id error
    pub fn duplicate_id(id: RequestId) -> Self {
        Self::DuplicateId { id }
    }

    /// Create an abandoned request error
    pub fn abandoned(id: RequestId) -> Self {
        Self::Abandoned { id }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the error was produced by a worker rather than the caller's input
    pub fn is_worker_failure(&self) -> bool {
        matches!(
            self,
            Self::Execution { .. }
                | Self::ConnectionLost { .. }
                | Self::Timeout { .. }
                | Self::Abandoned { .. }
        )
    }
}

impl From<DatabaseError> for DispatchError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Execution { message } => Self::Execution { message },
            DatabaseError::ConnectionLost { message } => Self::ConnectionLost { message },
        }
    }
}

impl From<config::ConfigError> for DispatchError {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_map_onto_dispatch_errors() {
        let err: DispatchError = DatabaseError::execution("syntax error").into();
        assert_eq!(
            err,
            DispatchError::Execution {
                message: "syntax error".to_string()
            }
        );

        let err: DispatchError = DatabaseError::connection_lost("reset by peer").into();
        assert!(matches!(err, DispatchError::ConnectionLost { .. }));
        assert!(err.is_worker_failure());
    }

    #[test]
    fn caller_errors_are_not_worker_failures() {
        assert!(!DispatchError::unknown_id(RequestId::from(3)).is_worker_failure());
        assert!(!DispatchError::format("select {}", "missing argument").is_worker_failure());
        assert!(!DispatchError::ShuttingDown.is_worker_failure());
    }

    #[test]
    fn display_includes_request_id() {
        let err = DispatchError::abandoned(RequestId::from(42));
        assert_eq!(err.to_string(), "Request 42 was abandoned before completion");
    }
}
