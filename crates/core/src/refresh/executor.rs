//! Background execution of cache rebuilds

use std::fmt;

use repocache_common::error::{CommonError, CommonResult};
use tracing::debug;

/// A unit of rebuild work
pub type RefreshJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs rebuild jobs off the caller's thread
pub trait RefreshExecutor: Send + Sync {
    /// Schedule `job`; an error means the job will never run
    fn execute(&self, job: RefreshJob) -> CommonResult<()>;
}

/// Fixed-size worker pool backed by rayon
pub struct ThreadPoolExecutor {
    pool: rayon::ThreadPool,
}

impl ThreadPoolExecutor {
    pub fn new(worker_threads: usize) -> CommonResult<Self> {
        if worker_threads == 0 {
            return Err(CommonError::validation("worker_threads", "must be greater than zero"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|index| format!("refresh-worker-{index}"))
            .build()
            .map_err(|err| {
                CommonError::internal_with_context(err.to_string(), "building refresh worker pool")
            })?;
        debug!(worker_threads, "refresh worker pool started");
        Ok(Self { pool })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl RefreshExecutor for ThreadPoolExecutor {
    fn execute(&self, job: RefreshJob) -> CommonResult<()> {
        self.pool.spawn(job);
        Ok(())
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor").field("worker_threads", &self.worker_threads()).finish()
    }
}

/// Runs each job on the calling thread
///
/// Rebuilds finish before `execute` returns, which makes refresh ordering
/// deterministic in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl RefreshExecutor for InlineExecutor {
    fn execute(&self, job: RefreshJob) -> CommonResult<()> {
        job();
        Ok(())
    }
}
