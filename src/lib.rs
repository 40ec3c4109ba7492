pub mod analyzer;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod detect;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod policy;
pub mod pool;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod util;

pub use error::SchedulerError;
pub use pool::{JobHandle, PoolStats, TaskPool};
pub use report::{AnalysisReport, Verdict};
pub use scheduler::SchedulerHandle;
