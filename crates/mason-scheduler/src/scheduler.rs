use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

use mason_core::panic_payload_to_str;

use crate::pool::{build_worker_pool, WorkerPool};
use crate::{CancellationToken, ExecTask, ProgressSender, TaskError};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_threads: usize,
    pub progress_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            // `available_parallelism()` can report the host CPU count even when
            // the process is constrained by cgroups. Keep the default
            // conservative; callers that want full-core utilization provide an
            // explicit config.
            worker_threads: available.saturating_sub(1).clamp(1, 8),
            progress_channel_capacity: 1024,
        }
    }
}

/// Owns the worker pool and the progress channel shared by all calls.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    workers: WorkerPool,
    progress: ProgressSender,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let workers = build_worker_pool("mason-worker", config.worker_threads);
        let (progress_tx, _) = broadcast::channel(config.progress_channel_capacity.max(1));
        let progress = ProgressSender::new(progress_tx);

        Self {
            inner: Arc::new(SchedulerInner { workers, progress }),
        }
    }

    pub fn progress(&self) -> ProgressSender {
        self.inner.progress.clone()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<crate::ProgressEvent> {
        self.inner.progress.subscribe()
    }

    /// Run `job` on the worker pool under `token`.
    ///
    /// Exactly one of {value, cancelled, error} is observable through the
    /// returned task. Panics are caught on the worker and reported as
    /// [`TaskError::Panicked`] with the payload preserved for logging.
    pub fn spawn<T, F>(&self, token: CancellationToken, job: F) -> ExecTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, TaskError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(TaskError::Cancelled));
            return ExecTask::new(token, rx);
        }

        let token_for_job = token.clone();
        self.inner.workers.spawn(move || {
            let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                job(token_for_job)
            })) {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_payload_to_str(&*panic).to_string();
                    tracing::error!(
                        target: "mason.scheduler",
                        panic = %message,
                        "job panicked"
                    );
                    Err(TaskError::Panicked { message })
                }
            };
            let _ = tx.send(result);
        });

        ExecTask::new(token, rx)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{ensure_live, DEFAULT_POLL_INTERVAL};

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            worker_threads: 2,
            progress_channel_capacity: 16,
        })
    }

    #[test]
    fn cancellation_returns_within_poll_interval_bound() {
        let scheduler = scheduler();
        let token = CancellationToken::new();
        let task = scheduler.spawn(token.clone(), |token| {
            // Cooperative but slow job: keeps running until told to stop.
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(0_u32)
        });

        let start = Instant::now();
        token.cancel();
        let result = task.join_polling(DEFAULT_POLL_INTERVAL);

        assert_eq!(result, Err(TaskError::Cancelled));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn job_observed_cancellation_reports_as_cancelled() {
        let scheduler = scheduler();
        let token = CancellationToken::new();
        token.cancel();

        let task = scheduler.spawn(token, |token| {
            ensure_live(&token)?;
            Ok(1_u32)
        });
        assert_eq!(
            task.join_polling(DEFAULT_POLL_INTERVAL),
            Err(TaskError::Cancelled)
        );
    }

    #[test]
    fn panic_is_reported_as_task_error_with_message() {
        let scheduler = scheduler();
        let task = scheduler.spawn(CancellationToken::new(), |_token| -> Result<u32, TaskError> {
            panic!("boom");
        });

        match task.join_polling(DEFAULT_POLL_INTERVAL) {
            Err(TaskError::Panicked { message }) => assert_eq!(message, "boom"),
            other => panic!("expected panic outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn async_join_observes_cancellation_before_worker_finishes() {
        let scheduler = scheduler();
        let token = CancellationToken::new();
        let task = scheduler.spawn(token.clone(), |_token| {
            // Deliberately ignores its token; the caller must still return
            // promptly, with the worker's result discarded in the background.
            std::thread::sleep(Duration::from_secs(5));
            Ok(7_u32)
        });

        let start = Instant::now();
        token.cancel();
        let result = task.join().await;

        assert_eq!(result, Err(TaskError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn successful_job_returns_payload() {
        let scheduler = scheduler();
        let task = scheduler.spawn(CancellationToken::new(), |_token| Ok(41_u32 + 1));
        assert_eq!(task.join_polling(DEFAULT_POLL_INTERVAL), Ok(42));
    }
}
