//! Pool manager handed to callers that need CPU-bound work done off their
//! own thread of control. One pool per job family; jobs are routed by kind.

use crate::{
    analyzer,
    config::{Analysis, Config},
    crypto::{self, Sealed, SealedFile},
    error::SchedulerError,
    job::{Job, JobKind, JobOutput},
    pool::{JobHandle, PoolSettings, PoolStats, TaskPool},
    report::AnalysisReport,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const ANALYSIS_POOL: &str = "steganography";
pub const ENCRYPTION_POOL: &str = "encryption";
pub const HASHING_POOL: &str = "hashing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub analysis: PoolStats,
    pub encryption: PoolStats,
    pub hashing: PoolStats,
}

/// Cheap to clone; every clone drives the same pools.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    analysis_cfg: Arc<Analysis>,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Idle,
    Running(Arc<Pools>),
    Stopped,
}

struct Pools {
    analysis: TaskPool,
    encryption: TaskPool,
    hashing: TaskPool,
}

impl Pools {
    fn for_kind(&self, kind: JobKind) -> &TaskPool {
        match kind {
            JobKind::AnalyzeFile => &self.analysis,
            JobKind::Encrypt => &self.encryption,
            JobKind::Hash => &self.hashing,
        }
    }

    fn shutdown(&self) {
        self.analysis.shutdown();
        self.encryption.shutdown();
        self.hashing.shutdown();
    }
}

impl SchedulerHandle {
    /// Builds a handle without starting any worker. Submissions fail with
    /// [`SchedulerError::PoolUninitialized`] until [`start`](Self::start).
    pub fn new(cfg: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg: cfg.clone(),
                analysis_cfg: Arc::new(cfg.analysis.clone()),
                lifecycle: Mutex::new(Lifecycle::Idle),
            }),
        }
    }

    pub fn started(cfg: &Config) -> Result<Self, SchedulerError> {
        let handle = Self::new(cfg);
        handle.start()?;
        Ok(handle)
    }

    /// Spawns the pools. No-op while already running; restarts after a shutdown.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Running(_)) {
            return Ok(());
        }

        let sched = &self.inner.cfg.scheduler;
        let settings = |size: usize| PoolSettings {
            size,
            max_queued: sched.max_queued_jobs,
            job_timeout: sched.job_timeout(),
        };
        let pools = Pools {
            analysis: TaskPool::new(ANALYSIS_POOL, settings(sched.analysis_pool_size()))?,
            encryption: TaskPool::new(ENCRYPTION_POOL, settings(sched.encryption_pool_size()))?,
            hashing: TaskPool::new(HASHING_POOL, settings(sched.hashing_pool_size()))?,
        };
        info!(
            "scheduler started analysis={} encryption={} hashing={}",
            sched.analysis_pool_size(),
            sched.encryption_pool_size(),
            sched.hashing_pool_size()
        );
        *lifecycle = Lifecycle::Running(Arc::new(pools));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Running(_))
    }

    fn pools(&self) -> Result<Arc<Pools>, SchedulerError> {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Running(pools) => Ok(Arc::clone(pools)),
            Lifecycle::Idle => Err(SchedulerError::PoolUninitialized),
            Lifecycle::Stopped => Err(SchedulerError::ShutDown),
        }
    }

    fn run<T, F>(&self, kind: JobKind, task: F) -> JobHandle<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.pools() {
            Ok(pools) => pools.for_kind(kind).submit(kind, task),
            Err(err) => JobHandle::failed(err),
        }
    }

    /// Analyzes `buffer` on the steganography pool.
    ///
    /// With `scheduler.job_timeout_ms` set, the deadline on the returned
    /// handle is only enforced while it is polled inside a Tokio runtime with
    /// the time driver enabled. Elsewhere the handle waits for the worker.
    pub fn analyze(
        &self,
        buffer: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> JobHandle<AnalysisReport> {
        let cfg = Arc::clone(&self.inner.analysis_cfg);
        let filename = filename.to_string();
        let mime_type = mime_type.to_string();
        self.run(JobKind::AnalyzeFile, move || {
            Ok(analyzer::analyze(&cfg, &buffer, &filename, &mime_type))
        })
    }

    pub fn encrypt(&self, plaintext: Vec<u8>, key_hex: &str, iv_hex: &str) -> JobHandle<Sealed> {
        let key_hex = key_hex.to_string();
        let iv_hex = iv_hex.to_string();
        self.run(JobKind::Encrypt, move || {
            crypto::encrypt(&plaintext, &key_hex, &iv_hex)
        })
    }

    pub fn decrypt(
        &self,
        ciphertext_hex: &str,
        key_hex: &str,
        iv_hex: &str,
        tag_hex: &str,
    ) -> JobHandle<Vec<u8>> {
        let (ciphertext_hex, key_hex, iv_hex, tag_hex) = (
            ciphertext_hex.to_string(),
            key_hex.to_string(),
            iv_hex.to_string(),
            tag_hex.to_string(),
        );
        self.run(JobKind::Encrypt, move || {
            crypto::decrypt(&ciphertext_hex, &key_hex, &iv_hex, &tag_hex)
        })
    }

    /// Seals an attachment under a fresh random IV.
    pub fn encrypt_file(&self, contents: Vec<u8>, key_hex: &str) -> JobHandle<SealedFile> {
        let key_hex = key_hex.to_string();
        self.run(JobKind::Encrypt, move || {
            crypto::encrypt_file(&contents, &key_hex)
        })
    }

    pub fn hmac(&self, data: Vec<u8>, secret: &str) -> JobHandle<String> {
        let secret = secret.to_string();
        self.run(JobKind::Encrypt, move || crypto::hmac_hex(&data, &secret))
    }

    pub fn verify_hmac(&self, data: Vec<u8>, signature_hex: &str, secret: &str) -> JobHandle<bool> {
        let signature_hex = signature_hex.to_string();
        let secret = secret.to_string();
        self.run(JobKind::Encrypt, move || {
            crypto::verify_hmac(&data, &signature_hex, &secret)
        })
    }

    pub fn hash(&self, data: Vec<u8>) -> JobHandle<String> {
        self.run(JobKind::Hash, move || Ok(crypto::sha256_hex(&data)))
    }

    /// bcrypt on the hashing pool; `cost` defaults to
    /// [`crypto::DEFAULT_PASSWORD_COST`].
    pub fn hash_password(&self, password: &str, cost: Option<u32>) -> JobHandle<String> {
        let password = password.to_string();
        let cost = cost.unwrap_or(crypto::DEFAULT_PASSWORD_COST);
        self.run(JobKind::Hash, move || crypto::hash_password(&password, cost))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> JobHandle<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        self.run(JobKind::Hash, move || crypto::verify_password(&password, &hash))
    }

    /// Routes an arbitrary job to the pool for its kind.
    pub fn submit(&self, job: Job) -> JobHandle<JobOutput> {
        let cfg = Arc::clone(&self.inner.analysis_cfg);
        self.run(job.kind(), move || job.execute(&cfg))
    }

    /// Analysis pool snapshot for health checks; zeroed when not running.
    pub fn pool_stats(&self) -> PoolStats {
        match self.pools() {
            Ok(pools) => pools.analysis.stats(),
            Err(_) => PoolStats::empty(ANALYSIS_POOL),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        match self.pools() {
            Ok(pools) => SchedulerStats {
                running: true,
                analysis: pools.analysis.stats(),
                encryption: pools.encryption.stats(),
                hashing: pools.hashing.stats(),
            },
            Err(_) => SchedulerStats {
                running: false,
                analysis: PoolStats::empty(ANALYSIS_POOL),
                encryption: PoolStats::empty(ENCRYPTION_POOL),
                hashing: PoolStats::empty(HASHING_POOL),
            },
        }
    }

    /// Shuts every pool down. Idempotent and synchronous.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.inner.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(pools) => {
                pools.shutdown();
                info!("scheduler stopped");
            }
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
    }
}
