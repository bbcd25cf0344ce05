//! # Task Queue
//!
//! FIFO hand-off between submitters and workers.
//!
//! Producers append under a short `parking_lot` lock and wake exactly one idle
//! worker; any idle worker can service any task. Workers suspend on a
//! [`Notify`] while the queue is empty. Closing the queue stops every worker
//! before it pops another task and returns whatever was still queued.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::types::Task;
use super::worker::Liveness;
use crate::error::{DispatchError, Result};

pub struct TaskQueue<R> {
    tasks: Mutex<VecDeque<Task<R>>>,
    available: Notify,
    closed: AtomicBool,
}

impl<R> Default for TaskQueue<R> {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl<R> TaskQueue<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` at the tail and wake one idle worker
    pub fn enqueue(&self, task: Task<R>) -> Result<()> {
        {
            let mut tasks = self.tasks.lock();
            // Checked under the lock so close() cannot miss a late task
            if self.closed.load(Ordering::Acquire) {
                return Err(DispatchError::ShuttingDown);
            }
            tasks.push_back(task);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Wait for the next task, or `None` once the queue is closed.
    ///
    /// Every (re-)entry into the idle wait acknowledges the caller's liveness
    /// challenge. The stop flag is checked before popping, so no task is
    /// handed out after close.
    pub async fn dequeue(&self, liveness: &Liveness) -> Option<Task<R>> {
        loop {
            let mut notified = pin!(self.available.notified());
            // Registered before the checks below so a wake-up between the
            // check and the await is not lost
            notified.as_mut().enable();

            liveness.acknowledge();

            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            let next = self.tasks.lock().pop_front();
            if next.is_some() {
                return next;
            }

            notified.await;
        }
    }

    /// Wake every idle worker so it re-acknowledges its liveness flag
    pub fn wake_idle(&self) {
        self.available.notify_waiters();
    }

    /// Stop handing out tasks and return the ones that were still queued
    pub fn close(&self) -> Vec<Task<R>> {
        let abandoned: Vec<Task<R>> = {
            let mut tasks = self.tasks.lock();
            self.closed.store(true, Ordering::Release);
            tasks.drain(..).collect()
        };
        self.available.notify_waiters();
        abandoned
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}
