//! # Test Utilities
//!
//! In-memory database collaborator for exercising the dispatcher without a
//! server. Every successful command returns a single row holding the command
//! text, so results can be matched back to the request that produced them.
//!
//! A few commands are scripted:
//!
//! | Command | Behaviour |
//! |---|---|
//! | `sleep <ms>` | waits `<ms>` milliseconds, then succeeds |
//! | `hang` | never completes |
//! | `fail <message>` | execution error carrying `<message>` |
//! | `disconnect` | connection lost; the connection stays broken |

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::database::{Connection, Connector};
use crate::error::DatabaseError;

#[derive(Debug, Default)]
struct MemoryState {
    connections_opened: AtomicUsize,
    connect_failures: AtomicUsize,
    connect_delay_ms: AtomicU64,
    commits: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// Connector whose connections live in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

/// A connection opened by [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryConnection {
    id: usize,
    state: Arc<MemoryState>,
    broken: bool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next_connects(&self, count: usize) {
        self.state.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make every later connection attempt take `delay`
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state
            .connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    /// Commands that executed successfully, in execution order
    pub fn executed(&self) -> Vec<String> {
        self.state.executed.lock().clone()
    }
}

impl MemoryConnection {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, _auth: &str) -> Result<MemoryConnection, DatabaseError> {
        let delay = self.state.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let refused = self
            .state
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(DatabaseError::connection_lost("connection refused"));
        }

        let id = self.state.connections_opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MemoryConnection {
            id,
            state: self.state.clone(),
            broken: false,
        })
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Rows = Vec<String>;

    async fn execute(&mut self, command: &str) -> Result<Vec<String>, DatabaseError> {
        if self.broken {
            return Err(DatabaseError::connection_lost("connection is closed"));
        }

        let trimmed = command.trim();
        let (verb, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
        match verb {
            "hang" => std::future::pending::<()>().await,
            "sleep" => {
                let millis = rest.trim().parse::<u64>().map_err(|_| {
                    DatabaseError::execution(format!("invalid sleep duration '{rest}'"))
                })?;
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            "fail" => return Err(DatabaseError::execution(rest.trim())),
            "disconnect" => {
                self.broken = true;
                return Err(DatabaseError::connection_lost("server closed the connection"));
            }
            _ => {}
        }

        self.state.executed.lock().push(command.to_string());
        Ok(vec![command.to_string()])
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        if self.broken {
            return Err(DatabaseError::connection_lost("connection is closed"));
        }
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
