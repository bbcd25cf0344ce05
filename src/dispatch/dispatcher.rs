//! # Dispatcher
//!
//! Public entry point composing the formatter, queue, result store, worker
//! pool and health monitor.
//!
//! ```rust,no_run
//! use connection_pool::config::DispatcherConfig;
//! use connection_pool::dispatch::Dispatcher;
//! use connection_pool::database::postgres::PgConnector;
//!
//! # async fn example() -> connection_pool::Result<()> {
//! let dispatcher = Dispatcher::start(PgConnector, DispatcherConfig::new("postgres://app@localhost/ops")).await?;
//!
//! // Blocking: wait for the rows
//! let rows = dispatcher.submit("select * from servers limit {}", &[&10]).await?;
//!
//! // Non-blocking: collect the rows later
//! let id = dispatcher.submit_async("select * from servers limit {}", &[&3])?;
//! let later = dispatcher.await_result(id).await?;
//!
//! // No result, no completion
//! dispatcher.fire_and_forget("insert into audit values ({})", &[&42])?;
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::format::format_command;
use super::monitor::HealthMonitor;
use super::pool::{SlotStatus, WorkerPool};
use super::queue::TaskQueue;
use super::results::ResultStore;
use super::stats::{DispatchStats, StatsSnapshot};
use super::types::{IdAllocator, RequestId, Task};
use super::worker::WorkerContext;
use crate::config::DispatcherConfig;
use crate::database::{Connector, RowsOf};
use crate::error::{DispatchError, Result};

/// Bounded worker pool with request/result correlation
pub struct Dispatcher<C: Connector> {
    id: Uuid,
    pool: Arc<WorkerPool<C>>,
    results: ResultStore<RowsOf<C>>,
    ids: IdAllocator,
    stats: Option<Arc<DispatchStats>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    monitor_shutdown: Arc<Notify>,
    shutdown_timeout: Duration,
    stopped: AtomicBool,
}

impl<C: Connector> Dispatcher<C> {
    /// Open `worker_count` connections, start the workers and, if enabled,
    /// the health monitor.
    #[instrument(skip(connector, config), fields(worker_count = config.worker_count))]
    pub async fn start(connector: C, config: DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let stats = config
            .enable_stat_counters
            .then(|| Arc::new(DispatchStats::new()));

        let context = WorkerContext {
            connector: Arc::new(connector),
            auth: Arc::from(config.auth_string.as_str()),
            queue: Arc::new(TaskQueue::new()),
            stats: stats.clone(),
            statement_timeout: config.statement_timeout(),
        };
        let pool = Arc::new(WorkerPool::start(context, config.worker_count).await?);

        let monitor_shutdown = Arc::new(Notify::new());
        let monitor = config.enable_health_monitor.then(|| {
            HealthMonitor::new(
                id,
                pool.clone(),
                &config.health_monitor,
                monitor_shutdown.clone(),
            )
            .spawn()
        });

        info!(
            dispatcher_id = %id,
            workers = config.worker_count,
            health_monitor = config.enable_health_monitor,
            stat_counters = config.enable_stat_counters,
            "🚀 DISPATCH: Dispatcher started"
        );

        Ok(Self {
            id,
            pool,
            results: ResultStore::new(),
            ids: IdAllocator::new(),
            stats,
            monitor: Mutex::new(monitor),
            monitor_shutdown,
            shutdown_timeout: config.shutdown_timeout(),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run a command and wait for its rows.
    ///
    /// The template is formatted immediately; the command is enqueued when
    /// the returned future is first polled.
    pub fn submit(
        &self,
        template: &str,
        args: &[&dyn Display],
    ) -> impl Future<Output = Result<RowsOf<C>>> + Send + '_ {
        let command = format_command(template, args);
        async move {
            let id = self.enqueue_tracked(command?)?;
            self.await_result(id).await
        }
    }

    /// Enqueue a command and return its id without waiting
    pub fn submit_async(&self, template: &str, args: &[&dyn Display]) -> Result<RequestId> {
        let command = format_command(template, args)?;
        self.enqueue_tracked(command)
    }

    /// Wait for the result of an id returned by [`submit_async`].
    ///
    /// Each id can be awaited once; a second call fails with `UnknownId`.
    ///
    /// [`submit_async`]: Dispatcher::submit_async
    pub async fn await_result(&self, id: RequestId) -> Result<RowsOf<C>> {
        let outcome = self.results.await_completion(id).await;
        if let Some(stats) = &self.stats {
            if !matches!(outcome, Err(DispatchError::UnknownId { .. })) {
                stats.record_request(outcome.is_ok());
            }
        }
        outcome
    }

    /// Enqueue a command whose outcome nobody observes
    pub fn fire_and_forget(&self, template: &str, args: &[&dyn Display]) -> Result<()> {
        let command = format_command(template, args)?;
        self.pool.queue().enqueue(Task::untracked(command))?;
        if let Some(stats) = &self.stats {
            stats.record_command_submitted();
        }
        Ok(())
    }

    fn enqueue_tracked(&self, command: String) -> Result<RequestId> {
        let id = self.ids.allocate();
        let completion = self.results.register(id)?;

        if let Err(e) = self.pool.queue().enqueue(Task::tracked(completion, command)) {
            self.results.discard(id);
            return Err(e);
        }

        debug!(dispatcher_id = %self.id, request_id = %id, "📨 DISPATCH: Request enqueued");
        Ok(id)
    }

    /// Abandon queued tasks, stop the monitor and join every worker.
    ///
    /// The queue is closed first, so nothing is accepted or started once
    /// shutdown begins. Idempotent. Callers waiting on abandoned requests
    /// receive `Abandoned`.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(dispatcher_id = %self.id, "🛑 DISPATCH: Shutting down");

        let abandoned = self.pool.close();

        self.monitor_shutdown.notify_one();
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            let abort = monitor.abort_handle();
            if tokio::time::timeout(self.shutdown_timeout, monitor)
                .await
                .is_err()
            {
                warn!(dispatcher_id = %self.id, "⚠️ DISPATCH: Health monitor did not stop in time, aborting");
                abort.abort();
            }
        }

        self.pool.join(self.shutdown_timeout).await;

        match self.stats() {
            Some(stats) => info!(
                dispatcher_id = %self.id,
                abandoned,
                stats = %stats.to_json(),
                "🛑 DISPATCH: Dispatcher stopped"
            ),
            None => info!(dispatcher_id = %self.id, abandoned, "🛑 DISPATCH: Dispatcher stopped"),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Running totals, when stat counters are enabled
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|stats| stats.snapshot())
    }

    /// Per-slot worker state as seen by the health monitor
    pub fn slot_statuses(&self) -> Vec<SlotStatus> {
        self.pool.slot_statuses()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn active_workers(&self) -> usize {
        self.pool.active_workers()
    }

    /// Tasks waiting for a worker
    pub fn queued_tasks(&self) -> usize {
        self.pool.queue().len()
    }

    /// Tracked requests whose result has not been consumed
    pub fn pending_results(&self) -> usize {
        self.results.len()
    }
}

impl<C: Connector> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(dispatcher_id = %self.id, "🛑 DISPATCH: Dropped without shutdown, aborting workers");
        self.monitor_shutdown.notify_one();
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }
        self.pool.abort();
    }
}
