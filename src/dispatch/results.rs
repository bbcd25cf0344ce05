//! # Result Store
//!
//! Correlates tracked request ids with their outcomes.
//!
//! Each registered id owns a oneshot channel: the receiving half lives in the
//! store until a caller consumes it, the sending half travels with the task
//! as a [`Completion`]. Only the waiter for a given id is woken when that id
//! completes, and a completion can be delivered at most once because
//! [`Completion::complete`] consumes the handle.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use super::types::RequestId;
use crate::error::{DispatchError, Result};

/// Terminal outcome of a tracked request
pub type Outcome<R> = Result<R>;

/// Write half of a registered result entry
pub struct Completion<R> {
    id: RequestId,
    sender: oneshot::Sender<Outcome<R>>,
}

impl<R> Completion<R> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Publish the outcome, waking the waiter for this id.
    ///
    /// If the waiter has already gone away the outcome is discarded.
    pub fn complete(self, outcome: Outcome<R>) {
        let id = self.id;
        if self.sender.send(outcome).is_err() {
            debug!(request_id = %id, "📭 RESULTS: Waiter gone before completion, outcome discarded");
        }
    }
}

/// Map from request id to a pending outcome
pub struct ResultStore<R> {
    entries: DashMap<RequestId, oneshot::Receiver<Outcome<R>>>,
}

impl<R> Default for ResultStore<R> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<R: Send + 'static> ResultStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending entry for `id` and hand back its completion handle
    pub fn register(&self, id: RequestId) -> Result<Completion<R>> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(DispatchError::duplicate_id(id)),
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(receiver);
                Ok(Completion { id, sender })
            }
        }
    }

    /// Wait for `id` to complete and return its outcome.
    ///
    /// The entry is removed as soon as the wait begins, so each id can be
    /// consumed once; later lookups fail with `UnknownId`. A completion handle
    /// dropped without publishing (shutdown, worker restart) yields
    /// `Abandoned`.
    pub async fn await_completion(&self, id: RequestId) -> Outcome<R> {
        let (_, receiver) = self
            .entries
            .remove(&id)
            .ok_or_else(|| DispatchError::unknown_id(id))?;

        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(DispatchError::abandoned(id)),
        }
    }

    /// Drop the entry for `id` without waiting
    pub fn discard(&self, id: RequestId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered entries not yet consumed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
