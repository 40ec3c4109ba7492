//! Fixed-size pool of persistent worker threads.
//!
//! Every pool owns one lock (`PoolState`) and one condvar. Submission hands a
//! job straight to an idle slot when there is one and otherwise appends it to
//! a FIFO queue; a slot that finishes a job takes the queue head before it
//! goes idle. Results travel back over a oneshot channel, so callers await a
//! [`JobHandle`] instead of blocking a thread.

use crate::{error::SchedulerError, job::JobKind};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub type JobId = u64;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub size: usize,
    /// 0 keeps the queue unbounded.
    pub max_queued: usize,
    pub job_timeout: Option<Duration>,
}

impl PoolSettings {
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            max_queued: 0,
            job_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub pool_size: usize,
    pub active_workers: usize,
    pub available_workers: usize,
    pub queued_tasks: usize,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
}

impl PoolStats {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pool_size: 0,
            active_workers: 0,
            available_workers: 0,
            queued_tasks: 0,
            completed_jobs: 0,
            failed_jobs: 0,
        }
    }
}

pub struct TaskPool {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    name: String,
    state: Mutex<PoolState>,
    wake: Condvar,
    max_queued: usize,
    job_timeout: Option<Duration>,
}

struct PoolState {
    slots: Vec<WorkerSlot>,
    queue: VecDeque<QueuedJob>,
    accepting: bool,
    next_id: JobId,
    completed: u64,
    failed: u64,
}

/// `busy` stays set while `pending` holds a job or the worker is running one.
struct WorkerSlot {
    busy: bool,
    pending: Option<QueuedJob>,
}

struct QueuedJob {
    id: JobId,
    kind: JobKind,
    submitted_at: Instant,
    deadline: Option<Instant>,
    work: Box<dyn Work>,
}

/// Type-erased job body. `run` must call `release` exactly once, after the
/// task finished and before the result is delivered.
trait Work: Send {
    fn run(self: Box<Self>, release: &mut dyn FnMut(bool));
    fn reject(self: Box<Self>, err: SchedulerError);
}

struct Pending<F, T> {
    task: F,
    tx: oneshot::Sender<Result<T, SchedulerError>>,
}

impl<F, T> Work for Pending<F, T>
where
    F: FnOnce() -> anyhow::Result<T> + Send,
    T: Send,
{
    fn run(self: Box<Self>, release: &mut dyn FnMut(bool)) {
        let Pending { task, tx } = *self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(SchedulerError::WorkerExecutionFailed(format!("{err:#}"))),
            Err(payload) => Err(SchedulerError::WorkerExecutionFailed(panic_message(
                payload.as_ref(),
            ))),
        };
        release(outcome.is_ok());
        let _ = tx.send(outcome);
    }

    fn reject(self: Box<Self>, err: SchedulerError) {
        let _ = self.tx.send(Err(err));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl TaskPool {
    pub fn new(name: impl Into<String>, settings: PoolSettings) -> Result<Self, SchedulerError> {
        let name = name.into();
        let size = settings.size.max(1);
        let slots = (0..size)
            .map(|_| WorkerSlot {
                busy: false,
                pending: None,
            })
            .collect();

        let shared = Arc::new(Shared {
            name: name.clone(),
            state: Mutex::new(PoolState {
                slots,
                queue: VecDeque::new(),
                accepting: true,
                next_id: 1,
                completed: 0,
                failed: 0,
            }),
            wake: Condvar::new(),
            max_queued: settings.max_queued,
            job_timeout: settings.job_timeout,
        });

        let mut threads = Vec::with_capacity(size);
        for id in 0..size {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{name}-worker-{id}"))
                .spawn(move || worker_loop(&worker_shared, id));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    shared.state.lock().accepting = false;
                    shared.wake.notify_all();
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(SchedulerError::WorkerSpawn(err.to_string()));
                }
            }
        }

        info!(
            "pool {name} started workers={size} max_queued={} job_timeout={:?}",
            settings.max_queued, settings.job_timeout
        );

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queues `task` for execution. Never blocks beyond the pool lock; every
    /// outcome, including rejection, is delivered through the returned handle.
    pub fn submit<T, F>(&self, kind: JobKind, task: F) -> JobHandle<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let submitted_at = Instant::now();
        let deadline = self.shared.job_timeout.map(|t| submitted_at + t);
        let work: Box<dyn Work> = Box::new(Pending { task, tx });

        let mut state = self.shared.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let handle = JobHandle {
            id,
            rx,
            deadline,
            timeout: self.shared.job_timeout.unwrap_or_default(),
            timer: None,
        };
        let job = QueuedJob {
            id,
            kind,
            submitted_at,
            deadline,
            work,
        };

        if !state.accepting {
            drop(state);
            debug!("pool {} rejected job {id}: shut down", self.shared.name);
            job.work.reject(SchedulerError::ShutDown);
            return handle;
        }

        if let Some(slot) = state.slots.iter_mut().find(|s| !s.busy) {
            slot.busy = true;
            slot.pending = Some(job);
            drop(state);
            self.shared.wake.notify_all();
            return handle;
        }

        let bounded = self.shared.max_queued > 0;
        let mut expired = Vec::new();
        if bounded && state.queue.len() >= self.shared.max_queued {
            expired = drain_expired(&mut state.queue, submitted_at);
            state.failed += expired.len() as u64;
        }

        if bounded && state.queue.len() >= self.shared.max_queued {
            let queued = state.queue.len();
            drop(state);
            warn!(
                "pool {} queue full ({queued}); rejecting job {id} kind={kind:?}",
                self.shared.name
            );
            job.work.reject(SchedulerError::QueueFull);
        } else {
            state.queue.push_back(job);
            debug!(
                "pool {} queued job {id} kind={kind:?} depth={}",
                self.shared.name,
                state.queue.len()
            );
            drop(state);
        }

        if !expired.is_empty() {
            warn!(
                "pool {} dropped {} queued jobs past their deadline",
                self.shared.name,
                expired.len()
            );
        }
        let timeout = self.shared.job_timeout.unwrap_or_default();
        for stale in expired {
            stale.work.reject(SchedulerError::Timeout(timeout));
        }
        handle
    }

    /// Snapshot copied under the pool lock.
    pub fn stats(&self) -> PoolStats {
        let (pool_size, active_workers, queued_tasks, completed_jobs, failed_jobs) = {
            let state = self.shared.state.lock();
            (
                state.slots.len(),
                state.slots.iter().filter(|s| s.busy).count(),
                state.queue.len(),
                state.completed,
                state.failed,
            )
        };
        PoolStats {
            name: self.shared.name.clone(),
            pool_size,
            active_workers,
            available_workers: pool_size - active_workers,
            queued_tasks,
            completed_jobs,
            failed_jobs,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.shared.state.lock().accepting
    }

    /// Stops accepting work, fails every queued job with
    /// [`SchedulerError::ShutDown`], waits for in-flight jobs and joins the
    /// worker threads. Safe to call more than once.
    pub fn shutdown(&self) {
        let drained: Vec<QueuedJob> = {
            let mut state = self.shared.state.lock();
            state.accepting = false;
            state.queue.drain(..).collect()
        };
        self.shared.wake.notify_all();

        if !drained.is_empty() {
            warn!(
                "pool {} shutting down; rejecting {} queued jobs",
                self.shared.name,
                drained.len()
            );
        }
        for job in drained {
            job.work.reject(SchedulerError::ShutDown);
        }

        let threads = std::mem::take(&mut *self.threads.lock());
        if threads.is_empty() {
            return;
        }

        // A job that drops the last pool reference ends up here on a worker thread.
        let current = thread::current().id();
        for handle in threads {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("pool {} worker thread panicked during shutdown", self.shared.name);
            }
        }
        info!("pool {} shut down", self.shared.name);
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared, id: usize) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.slots[id].pending.take() {
                    break job;
                }
                if !state.accepting {
                    debug!("pool {} worker {id} exiting", shared.name);
                    return;
                }
                shared.wake.wait(&mut state);
            }
        };
        execute(shared, id, job);
    }
}

fn execute(shared: &Shared, worker: usize, job: QueuedJob) {
    let QueuedJob {
        id,
        kind,
        submitted_at,
        deadline,
        work,
    } = job;

    if deadline.is_some_and(|d| Instant::now() >= d) {
        warn!(
            "pool {} job {id} kind={kind:?} expired after {:?} in queue",
            shared.name,
            submitted_at.elapsed()
        );
        release_slot(shared, worker, false);
        work.reject(SchedulerError::Timeout(shared.job_timeout.unwrap_or_default()));
        return;
    }

    debug!(
        "pool {} worker {worker} start job {id} kind={kind:?} waited_ms={}",
        shared.name,
        submitted_at.elapsed().as_millis()
    );
    let started = Instant::now();
    let mut succeeded = true;
    work.run(&mut |ok| {
        succeeded = ok;
        release_slot(shared, worker, ok);
    });

    if succeeded {
        debug!(
            "pool {} worker {worker} finished job {id} in {}ms",
            shared.name,
            started.elapsed().as_millis()
        );
    } else {
        warn!(
            "pool {} worker {worker} job {id} kind={kind:?} failed after {}ms",
            shared.name,
            started.elapsed().as_millis()
        );
    }
}

/// Removes queued jobs whose deadline has passed, keeping the rest in order.
fn drain_expired(queue: &mut VecDeque<QueuedJob>, now: Instant) -> Vec<QueuedJob> {
    let (expired, live): (Vec<_>, Vec<_>) = queue
        .drain(..)
        .partition(|job| job.deadline.is_some_and(|d| now >= d));
    queue.extend(live);
    expired
}

/// Hands the queue head to this slot, or marks it idle.
fn release_slot(shared: &Shared, worker: usize, ok: bool) {
    let mut state = shared.state.lock();
    if ok {
        state.completed += 1;
    } else {
        state.failed += 1;
    }
    let next = state.queue.pop_front();
    let slot = &mut state.slots[worker];
    match next {
        Some(job) => slot.pending = Some(job),
        None => slot.busy = false,
    }
}

/// Resolves to the job's result. When the pool has a job timeout the handle
/// also resolves to [`SchedulerError::Timeout`] once the deadline passes. The
/// deadline timer needs a Tokio runtime with the time driver enabled; polled
/// outside a runtime the handle simply waits for the worker.
pub struct JobHandle<T> {
    id: JobId,
    rx: oneshot::Receiver<Result<T, SchedulerError>>,
    deadline: Option<Instant>,
    timeout: Duration,
    timer: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl<T> JobHandle<T> {
    /// A handle that is already resolved to `err`.
    pub fn failed(err: SchedulerError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self {
            id: 0,
            rx,
            deadline: None,
            timeout: Duration::ZERO,
            timer: None,
        }
    }

    /// 0 for handles that never reached a pool.
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, SchedulerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Poll::Ready(received) = Pin::new(&mut this.rx).poll(cx) {
            return Poll::Ready(received.unwrap_or(Err(SchedulerError::WorkerExited)));
        }

        if this.timer.is_none() {
            if let Some(deadline) = this.deadline {
                if tokio::runtime::Handle::try_current().is_ok() {
                    this.timer = Some(Box::pin(tokio::time::sleep_until(deadline.into())));
                }
            }
        }
        if let Some(timer) = this.timer.as_mut() {
            if timer.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(SchedulerError::Timeout(this.timeout)));
            }
        }

        Poll::Pending
    }
}
