use rayon::ThreadPool;

/// The long-lived pool executing server calls. Each call occupies exactly
/// one worker for its duration.
pub(crate) enum WorkerPool {
    Rayon(ThreadPool),
    /// Degraded mode: run jobs on the caller's thread.
    Inline,
}

impl WorkerPool {
    pub(crate) fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            WorkerPool::Rayon(pool) => pool.spawn(job),
            WorkerPool::Inline => job(),
        }
    }
}

/// Thread creation can fail in constrained CI/sandbox environments (low
/// RLIMIT_NPROC, `EAGAIN`). Degrade to a smaller pool, and as a last resort
/// to inline execution, instead of failing server startup.
pub(crate) fn build_worker_pool(prefix: &'static str, threads: usize) -> WorkerPool {
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return WorkerPool::Rayon(pool),
            Err(_) if threads > 1 => {
                threads = (threads / 2).max(1);
            }
            Err(_) => {
                tracing::warn!(
                    target: "mason.scheduler",
                    "could not create any worker threads; running jobs inline"
                );
                return WorkerPool::Inline;
            }
        }
    }
}
