//! # Worker Pool
//!
//! Owns the fixed set of worker slots and their lifecycle: start, forced
//! restart of an individual slot, and shutdown.
//!
//! A slot's connection lives inside the worker task running in it. Aborting
//! that task drops the in-flight future together with the connection, which
//! closes it; the task's completion handle is dropped too, so a caller waiting
//! on the abandoned request is told so instead of waiting forever.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::queue::TaskQueue;
use super::worker::{Liveness, Worker, WorkerContext};
use crate::database::{Connector, RowsOf};
use crate::error::{DispatchError, Result};

/// One worker position in the pool
#[derive(Debug)]
pub struct WorkerSlot {
    index: usize,
    liveness: Arc<Liveness>,
    handle: Mutex<Option<JoinHandle<()>>>,
    restarts: AtomicU64,
}

impl WorkerSlot {
    fn new(index: usize) -> Self {
        Self {
            index,
            liveness: Arc::new(Liveness::default()),
            handle: Mutex::new(None),
            restarts: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Number of times the slot's worker has been replaced
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Whether a worker task is currently running in the slot
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Result of a successful [`WorkerPool::restart_slot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The worker was replaced on a fresh connection
    Restarted,
    /// The worker answered its challenge before it was aborted and was kept
    Recovered,
}

/// Per-slot view used by health reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    pub index: usize,
    pub running: bool,
    pub challenged: bool,
    pub restarts: u64,
}

pub struct WorkerPool<C: Connector> {
    context: Arc<WorkerContext<C>>,
    slots: Vec<WorkerSlot>,
}

impl<C: Connector> WorkerPool<C> {
    /// Open `worker_count` connections and spawn one worker on each.
    ///
    /// Fails without spawning anything if any connection cannot be opened.
    #[instrument(skip(context))]
    pub async fn start(context: WorkerContext<C>, worker_count: usize) -> Result<Self> {
        let context = Arc::new(context);

        info!("🏊 POOL: Opening {} connections", worker_count);
        let connections = try_join_all((0..worker_count).map(|_| context.connect())).await?;

        let slots: Vec<WorkerSlot> = (0..worker_count).map(WorkerSlot::new).collect();
        let pool = Self { context, slots };

        for (slot, connection) in pool.slots.iter().zip(connections) {
            let handle = pool.spawn_worker(slot, connection);
            *slot.handle.lock() = Some(handle);
        }

        info!("✅ POOL: Started {} workers", worker_count);
        Ok(pool)
    }

    fn spawn_worker(&self, slot: &WorkerSlot, connection: C::Connection) -> JoinHandle<()> {
        let worker = Worker::new(
            slot.index,
            connection,
            self.context.clone(),
            slot.liveness.clone(),
        );
        tokio::spawn(worker.run())
    }

    pub fn queue(&self) -> &Arc<TaskQueue<RowsOf<C>>> {
        &self.context.queue
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots with a running worker task
    pub fn active_workers(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_running()).count()
    }

    pub fn slot_statuses(&self) -> Vec<SlotStatus> {
        self.slots
            .iter()
            .map(|slot| SlotStatus {
                index: slot.index,
                running: slot.is_running(),
                challenged: slot.liveness.is_challenged(),
                restarts: slot.restarts(),
            })
            .collect()
    }

    /// Raise every slot's liveness flag and wake idle workers to answer it
    pub fn challenge_all(&self) {
        for slot in &self.slots {
            slot.liveness.challenge();
        }
        self.context.queue.wake_idle();
    }

    /// Slots that ignored the last challenge or have no running worker
    pub fn unresponsive_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|slot| slot.liveness.is_challenged() || !slot.is_running())
            .map(|slot| slot.index)
            .collect()
    }

    /// Replace the worker in slot `index` with a new one on a fresh connection.
    ///
    /// The slot is checked again under its handle lock before anything is
    /// aborted: a worker that answered the challenge since the slot was
    /// reported unresponsive is left alone and `Recovered` is returned. If the
    /// new connection cannot be opened the slot is left empty and the error is
    /// returned; the slot stays unresponsive so the next health cycle tries
    /// again.
    #[instrument(skip(self))]
    pub async fn restart_slot(&self, index: usize) -> Result<RestartOutcome> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| DispatchError::configuration(format!("no worker slot {index}")))?;

        if self.context.queue.is_closed() {
            return Err(DispatchError::ShuttingDown);
        }

        {
            let mut handle = slot.handle.lock();
            let running = handle.as_ref().is_some_and(|h| !h.is_finished());
            if running && !slot.liveness.is_challenged() {
                info!(worker = index, "💚 POOL: Worker answered challenge late, not restarting");
                return Ok(RestartOutcome::Recovered);
            }
            if let Some(old) = handle.take() {
                old.abort();
            }
        }

        let connection = self.context.connect().await?;
        if self.context.queue.is_closed() {
            return Err(DispatchError::ShuttingDown);
        }

        let handle = self.spawn_worker(slot, connection);
        *slot.handle.lock() = Some(handle);
        slot.liveness.acknowledge();
        slot.restarts.fetch_add(1, Ordering::Relaxed);
        if let Some(stats) = &self.context.stats {
            stats.record_restart();
        }

        info!(worker = index, "♻️ POOL: Worker restarted on a fresh connection");
        Ok(RestartOutcome::Restarted)
    }

    /// Stop handing out tasks and abandon the ones still queued.
    ///
    /// Waiters on abandoned tasks receive `Abandoned`. Returns the number of
    /// abandoned tasks.
    pub fn close(&self) -> usize {
        let abandoned = self.context.queue.close().len();
        if abandoned > 0 {
            warn!("🛑 POOL: Abandoning {} queued tasks", abandoned);
        }
        abandoned
    }

    /// Join every worker after [`close`](WorkerPool::close).
    ///
    /// Workers get `timeout` to finish the task they are executing; any still
    /// running after that are aborted.
    pub async fn join(&self, timeout: Duration) {
        let handles: Vec<JoinHandle<()>> = self
            .slots
            .iter()
            .filter_map(|slot| slot.handle.lock().take())
            .collect();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        if e.is_panic() {
                            error!(error = %e, "❌ POOL: Worker panicked");
                        }
                    }
                }
            }
            Err(_) => {
                warn!(
                    "⚠️ POOL: Workers did not stop within {}ms, aborting",
                    timeout.as_millis()
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        info!("🛑 POOL: All workers stopped");
    }

    /// Close the queue and join every worker. Returns the number of
    /// abandoned tasks.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let abandoned = self.close();
        self.join(timeout).await;
        abandoned
    }

    /// Close the queue and abort every worker without waiting
    pub fn abort(&self) {
        drop(self.context.queue.close());
        for slot in &self.slots {
            if let Some(handle) = slot.handle.lock().take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::results::ResultStore;
    use crate::dispatch::types::{RequestId, Task};
    use crate::test_utils::MemoryConnector;

    fn context(connector: MemoryConnector) -> WorkerContext<MemoryConnector> {
        WorkerContext {
            connector: Arc::new(connector),
            auth: Arc::from("memory://test"),
            queue: Arc::new(TaskQueue::new()),
            stats: None,
            statement_timeout: None,
        }
    }

    #[tokio::test]
    async fn start_opens_one_connection_per_worker() {
        let connector = MemoryConnector::new();
        let pool = WorkerPool::start(context(connector.clone()), 3).await.unwrap();

        assert_eq!(pool.worker_count(), 3);
        assert_eq!(pool.active_workers(), 3);
        assert_eq!(connector.connections_opened(), 3);

        pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(pool.active_workers(), 0);
    }

    #[tokio::test]
    async fn start_fails_when_a_connection_cannot_be_opened() {
        let connector = MemoryConnector::new();
        connector.fail_next_connects(1);

        let result = WorkerPool::start(context(connector), 2).await;
        assert!(matches!(result, Err(DispatchError::ConnectionLost { .. })));
    }

    #[tokio::test]
    async fn restart_replaces_a_stuck_worker() {
        let connector = MemoryConnector::new();
        let pool = WorkerPool::start(context(connector.clone()), 1).await.unwrap();
        let results = ResultStore::new();

        let stuck = results.register(RequestId::from(1)).unwrap();
        pool.queue()
            .enqueue(Task::tracked(stuck, "hang".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.challenge_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.unresponsive_slots(), vec![0]);

        assert_eq!(pool.restart_slot(0).await, Ok(RestartOutcome::Restarted));
        assert_eq!(
            results.await_completion(RequestId::from(1)).await,
            Err(DispatchError::abandoned(RequestId::from(1)))
        );
        assert_eq!(pool.slots()[0].restarts(), 1);
        assert_eq!(connector.connections_opened(), 2);
        assert!(pool.unresponsive_slots().is_empty());

        let next = results.register(RequestId::from(2)).unwrap();
        pool.queue()
            .enqueue(Task::tracked(next, "select 2".to_string()))
            .unwrap();
        assert_eq!(
            results.await_completion(RequestId::from(2)).await,
            Ok(vec!["select 2".to_string()])
        );

        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn idle_workers_answer_challenges() {
        let pool = WorkerPool::start(context(MemoryConnector::new()), 2)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.challenge_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pool.unresponsive_slots().is_empty());
        assert!(pool
            .slot_statuses()
            .iter()
            .all(|status| status.running && !status.challenged));

        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn shutdown_aborts_workers_that_overrun_the_timeout() {
        let pool = WorkerPool::start(context(MemoryConnector::new()), 1)
            .await
            .unwrap();
        pool.queue()
            .enqueue(Task::untracked("hang".to_string()))
            .unwrap();
        pool.queue()
            .enqueue(Task::untracked("insert into t values (1)".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_secs(2),
            pool.shutdown(Duration::from_millis(50)),
        )
        .await
        .expect("shutdown must not hang");
        assert_eq!(abandoned, 1);
    }

    #[tokio::test]
    async fn restart_skips_a_worker_that_answered_late() {
        let connector = MemoryConnector::new();
        let pool = WorkerPool::start(context(connector.clone()), 1).await.unwrap();
        let results = ResultStore::new();

        pool.queue()
            .enqueue(Task::untracked("sleep 40".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.challenge_all();
        assert_eq!(pool.unresponsive_slots(), vec![0]);

        // The slow statement finishes and the worker takes new work
        let next = results.register(RequestId::from(1)).unwrap();
        pool.queue()
            .enqueue(Task::tracked(next, "sleep 100".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(pool.restart_slot(0).await, Ok(RestartOutcome::Recovered));
        assert_eq!(pool.slots()[0].restarts(), 0);
        assert_eq!(connector.connections_opened(), 1);
        assert_eq!(
            results.await_completion(RequestId::from(1)).await,
            Ok(vec!["sleep 100".to_string()])
        );

        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn restart_is_refused_once_closed() {
        let pool = WorkerPool::start(context(MemoryConnector::new()), 1)
            .await
            .unwrap();
        assert_eq!(pool.close(), 0);

        assert_eq!(pool.restart_slot(0).await, Err(DispatchError::ShuttingDown));
        pool.join(Duration::from_secs(1)).await;
        assert_eq!(pool.active_workers(), 0);
    }
}
