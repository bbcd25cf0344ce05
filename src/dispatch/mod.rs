//! # Dispatch
//!
//! Bounded worker pool that serializes database access across a fixed set
//! of persistent connections.
//!
//! ## Architecture
//!
//! - **Formatter**: positional substitution of arguments into templates
//! - **Task Queue**: global FIFO shared by every worker, wake-one hand-off
//! - **Result Store**: per-request completion channels keyed by [`RequestId`]
//! - **Workers**: one connection each; execute, commit, publish outcome
//! - **Health Monitor**: challenge/grace liveness cycle restarting stuck workers
//! - **Dispatcher**: public API tying the above together
//!
//! ## Request Flow
//!
//! ```text
//! submit ─► format ─► allocate id ─► register result ─► enqueue
//!                                                          │
//!   await_result ◄─ complete(outcome) ◄─ execute + commit ◄┘ (worker)
//! ```
//!
//! Fire-and-forget commands skip id allocation and result registration.

pub mod dispatcher;
pub mod format;
pub mod monitor;
pub mod pool;
pub mod queue;
pub mod results;
pub mod stats;
pub mod types;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use format::{format_command, Literal};
pub use monitor::{HealthMonitor, HealthReport};
pub use pool::{RestartOutcome, SlotStatus, WorkerPool, WorkerSlot};
pub use queue::TaskQueue;
pub use results::{Completion, Outcome, ResultStore};
pub use stats::{DispatchStats, StatsSnapshot};
pub use types::{IdAllocator, RequestId, Task};
pub use worker::Liveness;
