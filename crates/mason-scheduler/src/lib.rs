//! Cancellable execution harness for mason's server calls.
//!
//! Jobs run on a long-lived blocking worker pool; the calling side holds an
//! [`ExecTask`] handle it can await with native cancellation (`select!` with
//! a biased cancellation arm) or poll on a bounded interval from sync code.
//! Cancellation is cooperative: a cancelled call returns promptly while the
//! worker runs to completion in the background and its result is discarded.

mod pool;
mod progress;
mod scheduler;
mod task;

use std::time::Duration;

pub use progress::{Progress, ProgressEvent, ProgressId, ProgressReceiver, ProgressSender};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use task::ExecTask;

pub use tokio_util::sync::CancellationToken;

/// Upper bound on added cancellation latency for sync callers polling an
/// [`ExecTask`]. Async joins observe cancellation without polling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Marker for a job that observed its cancellation token and stopped.
///
/// Reported identically to harness-driven cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Terminal outcome of a harness-executed job, other than success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,

    #[error("task panicked: {message}")]
    Panicked { message: String },

    #[error("{message}")]
    Failed { message: String },
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

impl From<Cancelled> for TaskError {
    fn from(_: Cancelled) -> Self {
        TaskError::Cancelled
    }
}

/// Cooperative check for jobs: `ensure_live(&token)?` at iteration
/// boundaries keeps cancellation latency bounded by the work between checks.
pub fn ensure_live(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}
