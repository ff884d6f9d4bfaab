use std::time::Duration;

use tokio::sync::oneshot;

use crate::{CancellationToken, TaskError};

/// Handle to a job running on the worker pool.
///
/// Dropping the handle (or returning early on cancellation) drops the
/// receiving half of the result channel; the worker's eventual send fails
/// silently and the result is discarded. The worker thread itself belongs to
/// the pool and is never leaked.
pub struct ExecTask<T> {
    token: CancellationToken,
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> ExecTask<T> {
    pub(crate) fn new(
        token: CancellationToken,
        rx: oneshot::Receiver<Result<T, TaskError>>,
    ) -> Self {
        Self { token, rx }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Await the result with native cancellation: the biased arm observes a
    /// cancelled token before the worker's result, so the caller returns
    /// without waiting for the worker to notice.
    pub async fn join(self) -> Result<T, TaskError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Cancelled),
            result = self.rx => match result {
                Ok(result) => result,
                Err(_) => Err(TaskError::Panicked {
                    message: "worker dropped result channel".to_string(),
                }),
            }
        }
    }

    /// Synchronous join for callers without a runtime: polls the result
    /// channel on `poll_interval`, which is also the worst-case added
    /// cancellation latency. The watcher and worker briefly overlap after a
    /// cancel; that race is accepted.
    pub fn join_polling(mut self, poll_interval: Duration) -> Result<T, TaskError> {
        loop {
            if self.token.is_cancelled() {
                return Err(TaskError::Cancelled);
            }

            match self.rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Empty) => {
                    std::thread::sleep(poll_interval);
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(TaskError::Panicked {
                        message: "worker dropped result channel".to_string(),
                    })
                }
            }
        }
    }
}
