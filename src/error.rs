use std::time::Duration;
use thiserror::Error;

/// Failures delivered to the caller that submitted a job.
///
/// None of these abort sibling jobs; the pool recovers the slot before the
/// error reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("worker pool is not initialized")]
    PoolUninitialized,
    #[error("worker execution failed: {0}")]
    WorkerExecutionFailed(String),
    #[error("worker exited without producing a result")]
    WorkerExited,
    #[error("worker pool is shut down")]
    ShutDown,
    #[error("job queue is full")]
    QueueFull,
    #[error("job exceeded its deadline of {0:?}")]
    Timeout(Duration),
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}
