use parking_lot::Mutex;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use stego_sentinel::{
    error::SchedulerError,
    job::JobKind,
    pool::{JobHandle, PoolSettings, TaskPool},
};

const KIND: JobKind = JobKind::AnalyzeFile;

fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

async fn settle<T>(handle: JobHandle<T>) -> Result<T, SchedulerError> {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("job handle never resolved")
}

#[tokio::test]
async fn idle_pool_reports_every_worker_available() {
    let pool = TaskPool::new("idle", PoolSettings::with_size(3)).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.name, "idle");
    assert_eq!(stats.pool_size, 3);
    assert_eq!(stats.available_workers, 3);
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.queued_tasks, 0);
}

#[tokio::test]
async fn queued_jobs_start_in_submission_order() {
    let pool = TaskPool::new("fair", PoolSettings::with_size(2)).unwrap();
    let started = Arc::new(Mutex::new(Vec::new()));
    let mut gates = Vec::new();
    let mut handles = Vec::new();

    for i in 0..5usize {
        let (tx, rx) = mpsc::channel::<()>();
        gates.push(tx);
        let started = Arc::clone(&started);
        handles.push(pool.submit(KIND, move || {
            started.lock().push(i);
            let _ = rx.recv();
            Ok(i)
        }));
    }

    wait_for("two running jobs", || started.lock().len() == 2);
    let stats = pool.stats();
    assert_eq!(stats.active_workers, 2);
    assert_eq!(stats.available_workers, 0);
    assert_eq!(stats.queued_tasks, 3);
    let mut first = started.lock().clone();
    first.sort();
    assert_eq!(first, vec![0, 1]);

    // Each finished job frees exactly one slot for the queue head.
    for (release, expected) in [(0usize, 2usize), (1, 3), (2, 4)] {
        gates[release].send(()).unwrap();
        wait_for("next queued job", || started.lock().len() == expected + 1);
        assert_eq!(started.lock()[expected], expected);
        assert_eq!(pool.stats().queued_tasks, 4 - expected);
    }
    gates[3].send(()).unwrap();
    gates[4].send(()).unwrap();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(settle(handle).await, Ok(i));
    }
    wait_for("idle pool", || pool.stats().active_workers == 0);
    assert_eq!(pool.stats().completed_jobs, 5);
}

#[tokio::test]
async fn a_panicking_job_does_not_take_down_its_siblings() {
    let pool = TaskPool::new("isolation", PoolSettings::with_size(4)).unwrap();

    let siblings: Vec<_> = (0..3u32)
        .map(|i| {
            pool.submit(KIND, move || {
                thread::sleep(Duration::from_millis(30));
                Ok(i)
            })
        })
        .collect();
    let failing = pool.submit(KIND, || -> anyhow::Result<u32> { panic!("corrupt buffer") });

    match settle(failing).await {
        Err(SchedulerError::WorkerExecutionFailed(msg)) => assert!(msg.contains("corrupt buffer")),
        other => panic!("unexpected result: {other:?}"),
    }
    for (i, handle) in siblings.into_iter().enumerate() {
        assert_eq!(settle(handle).await, Ok(i as u32));
    }

    let stats = pool.stats();
    assert_eq!(stats.available_workers, stats.pool_size);
    assert_eq!(stats.completed_jobs, 3);
    assert_eq!(stats.failed_jobs, 1);

    // The worker that caught the panic keeps serving.
    let again: Vec<_> = (0..4u32).map(|i| pool.submit(KIND, move || Ok(i * 2))).collect();
    for (i, handle) in again.into_iter().enumerate() {
        assert_eq!(settle(handle).await, Ok(i as u32 * 2));
    }
}

#[tokio::test]
async fn job_errors_are_reported_as_execution_failures() {
    let pool = TaskPool::new("errors", PoolSettings::with_size(1)).unwrap();
    let handle = pool.submit(KIND, || Err::<(), _>(anyhow::anyhow!("bad header")));
    match settle(handle).await {
        Err(SchedulerError::WorkerExecutionFailed(msg)) => assert!(msg.contains("bad header")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(pool.stats().available_workers, 1);
}

#[tokio::test]
async fn shutdown_resolves_every_outstanding_handle() {
    let pool = TaskPool::new("drain", PoolSettings::with_size(2)).unwrap();
    let handles: Vec<_> = (0..10u32)
        .map(|i| {
            pool.submit(KIND, move || {
                thread::sleep(Duration::from_millis(20));
                Ok(i)
            })
        })
        .collect();

    pool.shutdown();
    assert!(!pool.is_accepting());

    let (mut finished, mut rejected) = (0, 0);
    for handle in handles {
        match settle(handle).await {
            Ok(_) => finished += 1,
            Err(SchedulerError::ShutDown) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(finished + rejected, 10);
    assert!(finished >= 2, "jobs already handed to a worker still run");

    assert_eq!(
        settle(pool.submit(KIND, || Ok(1))).await,
        Err(SchedulerError::ShutDown)
    );
    pool.shutdown();
}

#[tokio::test]
async fn bounded_queue_rejects_overflow() {
    let settings = PoolSettings {
        size: 1,
        max_queued: 1,
        job_timeout: None,
    };
    let pool = TaskPool::new("bounded", settings).unwrap();
    let (tx, rx) = mpsc::channel::<()>();

    let running = pool.submit(KIND, move || {
        let _ = rx.recv();
        Ok("running")
    });
    let queued = pool.submit(KIND, || Ok("queued"));
    let overflow = pool.submit(KIND, || Ok("overflow"));

    assert_eq!(settle(overflow).await, Err(SchedulerError::QueueFull));
    tx.send(()).unwrap();
    assert_eq!(settle(running).await, Ok("running"));
    assert_eq!(settle(queued).await, Ok("queued"));
}

#[tokio::test]
async fn slow_and_stale_jobs_time_out() {
    let timeout = Duration::from_millis(50);
    let settings = PoolSettings {
        size: 1,
        max_queued: 0,
        job_timeout: Some(timeout),
    };
    let pool = TaskPool::new("deadline", settings).unwrap();

    let slow = pool.submit(KIND, || {
        thread::sleep(Duration::from_millis(200));
        Ok(())
    });
    let stale = pool.submit(KIND, || Ok(()));

    assert_eq!(settle(slow).await, Err(SchedulerError::Timeout(timeout)));
    assert!(matches!(settle(stale).await, Err(SchedulerError::Timeout(_))));

    wait_for("slow job to finish", || {
        let s = pool.stats();
        s.active_workers == 0 && s.queued_tasks == 0
    });
    assert_eq!(settle(pool.submit(KIND, || Ok(7))).await, Ok(7));
}

#[tokio::test]
async fn failed_handle_resolves_immediately() {
    let handle: JobHandle<()> = JobHandle::failed(SchedulerError::PoolUninitialized);
    assert_eq!(handle.id(), 0);
    assert_eq!(handle.await, Err(SchedulerError::PoolUninitialized));
}

#[tokio::test]
async fn expired_queued_jobs_do_not_hold_queue_capacity() {
    let timeout = Duration::from_millis(50);
    let settings = PoolSettings {
        size: 1,
        max_queued: 1,
        job_timeout: Some(timeout),
    };
    let pool = TaskPool::new("stale", settings).unwrap();
    let (tx, rx) = mpsc::channel::<()>();

    let running = pool.submit(KIND, move || {
        let _ = rx.recv();
        Ok("running")
    });
    let stale = pool.submit(KIND, || Ok("stale"));
    assert_eq!(settle(stale).await, Err(SchedulerError::Timeout(timeout)));
    assert_eq!(pool.stats().queued_tasks, 1);

    // The expired entry is dropped to make room instead of refusing.
    let fresh = pool.submit(KIND, || Ok("fresh"));
    let stats = pool.stats();
    assert_eq!(stats.queued_tasks, 1);
    assert_eq!(stats.failed_jobs, 1);

    tx.send(()).unwrap();
    assert_eq!(settle(fresh).await, Ok("fresh"));
    // Finished before it was awaited, so the result wins over the deadline.
    assert_eq!(settle(running).await, Ok("running"));
}

#[test]
fn handle_with_deadline_can_be_polled_without_a_runtime() {
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll, Waker};

    let settings = PoolSettings {
        size: 1,
        max_queued: 0,
        job_timeout: Some(Duration::from_secs(30)),
    };
    let pool = TaskPool::new("no-runtime", settings).unwrap();
    let (tx, rx) = mpsc::channel::<()>();
    let mut handle = pool.submit(KIND, move || {
        let _ = rx.recv();
        Ok(5)
    });

    let mut cx = Context::from_waker(Waker::noop());
    assert!(Pin::new(&mut handle).poll(&mut cx).is_pending());

    tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    let result = loop {
        if let Poll::Ready(result) = Pin::new(&mut handle).poll(&mut cx) {
            break result;
        }
        assert!(Instant::now() < deadline, "job never resolved");
        thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(result, Ok(5));
}
