//! # Worker
//!
//! A worker owns one connection and loops: wait for a task, execute it,
//! commit, publish the outcome. Every terminal outcome of a tracked task,
//! success or failure, completes that task's result entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use tracing::{debug, error, info, warn};

use super::queue::TaskQueue;
use super::stats::DispatchStats;
use super::types::Task;
use crate::database::{Connection, Connector, RowsOf};
use crate::error::{DatabaseError, DispatchError, Result};

/// Per-slot liveness flag.
///
/// The health monitor raises it as a challenge; the worker lowers it each
/// time it returns to the idle wait. A flag still raised after the grace
/// interval means the worker has made no progress.
#[derive(Debug, Default)]
pub struct Liveness {
    challenged: CachePadded<AtomicBool>,
}

impl Liveness {
    pub fn challenge(&self) {
        self.challenged.store(true, Ordering::Release);
    }

    pub fn acknowledge(&self) {
        self.challenged.store(false, Ordering::Release);
    }

    pub fn is_challenged(&self) -> bool {
        self.challenged.load(Ordering::Acquire)
    }
}

/// State shared by every worker of a pool
pub struct WorkerContext<C: Connector> {
    pub connector: Arc<C>,
    pub auth: Arc<str>,
    pub queue: Arc<TaskQueue<RowsOf<C>>>,
    pub stats: Option<Arc<DispatchStats>>,
    pub statement_timeout: Option<Duration>,
}

impl<C: Connector> WorkerContext<C> {
    /// Open a fresh connection for a worker slot
    pub async fn connect(&self) -> Result<C::Connection> {
        self.connector
            .connect(&self.auth)
            .await
            .map_err(|e| DispatchError::ConnectionLost {
                message: e.to_string(),
            })
    }
}

pub struct Worker<C: Connector> {
    index: usize,
    connection: Option<C::Connection>,
    context: Arc<WorkerContext<C>>,
    liveness: Arc<Liveness>,
}

impl<C: Connector> Worker<C> {
    pub fn new(
        index: usize,
        connection: C::Connection,
        context: Arc<WorkerContext<C>>,
        liveness: Arc<Liveness>,
    ) -> Self {
        Self {
            index,
            connection: Some(connection),
            context,
            liveness,
        }
    }

    /// Serve tasks until the queue is closed
    pub async fn run(mut self) {
        debug!(worker = self.index, "👷 WORKER: Started");

        while let Some(task) = self.context.queue.dequeue(&self.liveness).await {
            self.process(task).await;
        }

        debug!(worker = self.index, "👷 WORKER: Stopped");
    }

    async fn process(&mut self, task: Task<RowsOf<C>>) {
        let Task {
            id,
            command,
            completion,
            enqueued_at,
        } = task;
        let started = Instant::now();
        let outcome = self.execute(&command).await;

        debug!(
            worker = self.index,
            request_id = %id,
            queued_ms = started.duration_since(enqueued_at).as_millis() as u64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = outcome.is_ok(),
            "👷 WORKER: Task finished"
        );

        match completion {
            Some(completion) => completion.complete(outcome),
            None => {
                if let Some(stats) = &self.context.stats {
                    stats.record_command(outcome.is_ok());
                }
                if let Err(e) = outcome {
                    warn!(
                        worker = self.index,
                        command = %command,
                        error = %e,
                        "⚠️ WORKER: Fire-and-forget command failed"
                    );
                }
            }
        }
    }

    async fn execute(&mut self, command: &str) -> Result<RowsOf<C>> {
        if self.connection.is_none() {
            self.reconnect().await?;
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(DispatchError::ConnectionLost {
                message: format!("worker {} has no connection", self.index),
            });
        };

        let result = {
            let work = async {
                let rows = connection.execute(command).await?;
                connection.commit().await?;
                Ok::<_, DatabaseError>(rows)
            };
            match self.context.statement_timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| limit),
                None => Ok(work.await),
            }
        };

        match result {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(err)) => {
                if err.is_connection_lost() {
                    warn!(
                        worker = self.index,
                        error = %err,
                        "🔌 WORKER: Connection lost, will reconnect before next task"
                    );
                    self.connection = None;
                }
                Err(err.into())
            }
            Err(limit) => {
                warn!(
                    worker = self.index,
                    timeout_ms = limit.as_millis() as u64,
                    "⏱️ WORKER: Statement timed out, discarding connection"
                );
                self.connection = None;
                Err(DispatchError::Timeout { elapsed: limit })
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        match self.context.connect().await {
            Ok(connection) => {
                info!(worker = self.index, "🔌 WORKER: Reconnected");
                self.connection = Some(connection);
                Ok(())
            }
            Err(e) => {
                error!(worker = self.index, error = %e, "❌ WORKER: Reconnect failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::results::ResultStore;
    use crate::dispatch::types::RequestId;
    use crate::test_utils::MemoryConnector;

    async fn context(
        connector: MemoryConnector,
        statement_timeout: Option<Duration>,
    ) -> Arc<WorkerContext<MemoryConnector>> {
        Arc::new(WorkerContext {
            connector: Arc::new(connector),
            auth: Arc::from("memory://test"),
            queue: Arc::new(TaskQueue::new()),
            stats: Some(Arc::new(DispatchStats::new())),
            statement_timeout,
        })
    }

    async fn spawn_worker(
        context: &Arc<WorkerContext<MemoryConnector>>,
    ) -> tokio::task::JoinHandle<()> {
        let connection = context.connect().await.unwrap();
        let worker = Worker::new(0, connection, context.clone(), Arc::new(Liveness::default()));
        tokio::spawn(worker.run())
    }

    #[test]
    fn liveness_challenge_and_acknowledge() {
        let liveness = Liveness::default();
        assert!(!liveness.is_challenged());
        liveness.challenge();
        assert!(liveness.is_challenged());
        liveness.acknowledge();
        assert!(!liveness.is_challenged());
    }

    #[tokio::test]
    async fn tracked_task_completes_with_rows() {
        let context = context(MemoryConnector::new(), None).await;
        let handle = spawn_worker(&context).await;
        let results = ResultStore::new();

        let id = RequestId::from(1);
        let completion = results.register(id).unwrap();
        context
            .queue
            .enqueue(Task::tracked(completion, "select 1".to_string()))
            .unwrap();

        assert_eq!(
            results.await_completion(id).await,
            Ok(vec!["select 1".to_string()])
        );

        context.queue.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn execution_failure_completes_with_error() {
        let context = context(MemoryConnector::new(), None).await;
        let handle = spawn_worker(&context).await;
        let results = ResultStore::new();

        let id = RequestId::from(1);
        let completion = results.register(id).unwrap();
        context
            .queue
            .enqueue(Task::tracked(completion, "fail no such table".to_string()))
            .unwrap();

        let err = results.await_completion(id).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::Execution {
                message: "no such table".to_string()
            }
        );

        context.queue.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connection_loss_triggers_reconnect() {
        let connector = MemoryConnector::new();
        let context = context(connector.clone(), None).await;
        let handle = spawn_worker(&context).await;
        let results = ResultStore::new();

        let lost = results.register(RequestId::from(1)).unwrap();
        let next = results.register(RequestId::from(2)).unwrap();
        context
            .queue
            .enqueue(Task::tracked(lost, "disconnect".to_string()))
            .unwrap();
        context
            .queue
            .enqueue(Task::tracked(next, "select 2".to_string()))
            .unwrap();

        assert!(matches!(
            results.await_completion(RequestId::from(1)).await,
            Err(DispatchError::ConnectionLost { .. })
        ));
        assert_eq!(
            results.await_completion(RequestId::from(2)).await,
            Ok(vec!["select 2".to_string()])
        );
        assert_eq!(connector.connections_opened(), 2);

        context.queue.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn statement_timeout_fails_request_and_replaces_connection() {
        let connector = MemoryConnector::new();
        let context = context(connector.clone(), Some(Duration::from_millis(50))).await;
        let handle = spawn_worker(&context).await;
        let results = ResultStore::new();

        let stuck = results.register(RequestId::from(1)).unwrap();
        context
            .queue
            .enqueue(Task::tracked(stuck, "hang".to_string()))
            .unwrap();

        assert_eq!(
            results.await_completion(RequestId::from(1)).await,
            Err(DispatchError::Timeout {
                elapsed: Duration::from_millis(50)
            })
        );

        let next = results.register(RequestId::from(2)).unwrap();
        context
            .queue
            .enqueue(Task::tracked(next, "select 2".to_string()))
            .unwrap();
        assert!(results.await_completion(RequestId::from(2)).await.is_ok());
        assert_eq!(connector.connections_opened(), 2);

        context.queue.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failed_fire_and_forget_is_counted() {
        let context = context(MemoryConnector::new(), None).await;
        let handle = spawn_worker(&context).await;

        context
            .queue
            .enqueue(Task::untracked("fail duplicate key".to_string()))
            .unwrap();
        context
            .queue
            .enqueue(Task::untracked("insert into log values (1)".to_string()))
            .unwrap();

        let stats = context.stats.clone().unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while stats.snapshot().commands_executed + stats.snapshot().commands_failed < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("both commands should run");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.commands_failed, 1);
        assert_eq!(snapshot.commands_executed, 1);

        context.queue.close();
        handle.await.unwrap();
    }
}
