use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: Scheduler,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

/// Worker pool sizing. A worker count of 0 means "derive from the host".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub analysis_workers: usize,
    pub encryption_workers: usize,
    pub hashing_workers: usize,
    /// 0 keeps the queue unbounded.
    pub max_queued_jobs: usize,
    /// 0 disables the per-job deadline.
    pub job_timeout_ms: u64,
}
impl Default for Scheduler {
    fn default() -> Self {
        Self {
            analysis_workers: 0,
            encryption_workers: 0,
            hashing_workers: 2,
            max_queued_jobs: 0,
            job_timeout_ms: 0,
        }
    }
}

impl Scheduler {
    pub fn analysis_pool_size(&self) -> usize {
        resolve_workers(self.analysis_workers)
    }

    pub fn encryption_pool_size(&self) -> usize {
        resolve_workers(self.encryption_workers)
    }

    pub fn hashing_pool_size(&self) -> usize {
        self.hashing_workers.max(1)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_ms > 0).then(|| Duration::from_millis(self.job_timeout_ms))
    }
}

/// Leaves two cores for I/O threads but never drops below two workers.
pub fn default_pool_size() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(2).max(2)
}

fn resolve_workers(configured: usize) -> usize {
    if configured == 0 {
        default_pool_size()
    } else {
        configured
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    pub entropy_threshold_compressed: f64,
    pub entropy_threshold_default: f64,
    pub lsb_sample_bytes: usize,
    pub lsb_max_deviation: f64,
    pub lsb_min_pair_change_ratio: f64,
    pub lsb_min_sequential_change_ratio: f64,
    pub chi_square_max: f64,
    pub pattern_chunk_bytes: usize,
    pub pattern_max_occurrences: u32,
    pub pattern_density_divisor: usize,
    pub pixel_sample_pairs: usize,
    pub pixel_min_correlation: f64,
    pub weights: Weights,
}
impl Default for Analysis {
    fn default() -> Self {
        Self {
            entropy_threshold_compressed: 7.95,
            entropy_threshold_default: 7.5,
            lsb_sample_bytes: 50_000,
            lsb_max_deviation: 0.015,
            lsb_min_pair_change_ratio: 0.48,
            lsb_min_sequential_change_ratio: 0.24,
            chi_square_max: 350.0,
            pattern_chunk_bytes: 16,
            pattern_max_occurrences: 3,
            pattern_density_divisor: 100,
            pixel_sample_pairs: 10_000,
            pixel_min_correlation: 0.75,
            weights: Weights::default(),
        }
    }
}

/// Points added to the risk score when a test flags the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub entropy_compressed: u32,
    pub entropy_default: u32,
    pub lsb: u32,
    pub chi_square: u32,
    pub patterns: u32,
    pub pixel_correlation: u32,
    pub metadata: u32,
}
impl Default for Weights {
    fn default() -> Self {
        Self {
            entropy_compressed: 5,
            entropy_default: 25,
            lsb: 35,
            chi_square: 20,
            patterns: 20,
            pixel_correlation: 30,
            metadata: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_upload_bytes: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
