//! Core dispatch types: request identifiers and queued tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::results::Completion;
use crate::constants::ids;

/// Identifier correlating a submitted command with its result.
///
/// Tracked ids are strictly increasing and start at 1; [`RequestId::UNTRACKED`]
/// marks fire-and-forget commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const UNTRACKED: RequestId = RequestId(ids::UNTRACKED);

    pub fn is_tracked(self) -> bool {
        self != Self::UNTRACKED
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock-free source of tracked request ids
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(ids::FIRST_TRACKED),
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id; never returns [`RequestId::UNTRACKED`]
    pub fn allocate(&self) -> RequestId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != ids::UNTRACKED {
                return RequestId(id);
            }
        }
    }

    /// Highest id handed out so far, if any
    pub fn last_issued(&self) -> Option<RequestId> {
        match self.next.load(Ordering::Relaxed) {
            ids::FIRST_TRACKED => None,
            next => Some(RequestId(next.wrapping_sub(1))),
        }
    }
}

/// A formatted command waiting for a worker.
///
/// Owned by the queue until a worker pops it. `completion` is present exactly
/// when `id` is tracked; dropping the task without completing it reports the
/// request as abandoned.
pub struct Task<R> {
    pub id: RequestId,
    pub command: String,
    pub completion: Option<Completion<R>>,
    pub enqueued_at: Instant,
}

impl<R> Task<R> {
    pub fn tracked(completion: Completion<R>, command: String) -> Self {
        Self {
            id: completion.id(),
            command,
            completion: Some(completion),
            enqueued_at: Instant::now(),
        }
    }

    pub fn untracked(command: String) -> Self {
        Self {
            id: RequestId::UNTRACKED,
            command,
            completion: None,
            enqueued_at: Instant::now(),
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.completion.is_some()
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("tracked", &self.is_tracked())
            .finish()
    }
}
