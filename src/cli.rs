use crate::{
    config::Config,
    crypto::sha256_hex,
    pipeline::Pipeline,
    probe::probe_file,
    scheduler::SchedulerHandle,
    util::{ensure_dir, looks_like_url, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stego-sentinel")]
#[command(about = "Screen uploads for hidden payloads on a bounded worker pool")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./stego-sentinel.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print resolved pool sizing and live pool stats.
    Doctor {},
    /// Analyze one or more files and print the admission decision for each.
    Analyze {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Declared MIME type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },
    Hash {
        #[arg(long)]
        input: PathBuf,
    },
    Encrypt {
        #[arg(long)]
        key: String,
        #[arg(long)]
        iv: String,
        #[arg(long)]
        text: String,
    },
    Decrypt {
        #[arg(long)]
        key: String,
        #[arg(long)]
        iv: String,
        #[arg(long)]
        tag: String,
        #[arg(long)]
        ciphertext: String,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    let scheduler = SchedulerHandle::started(&cfg).context("starting worker pools")?;
    let result = match &args.cmd {
        Command::Doctor {} => doctor(&cfg, &scheduler),
        Command::Analyze { input, mime } => {
            block_on(analyze(&cfg, &scheduler, input, mime.as_deref()))
        }
        Command::Hash { input } => block_on(hash(&cfg, &scheduler, input)),
        Command::Encrypt { key, iv, text } => block_on(async {
            let sealed = scheduler.encrypt(text.as_bytes().to_vec(), key, iv).await?;
            println!("{}", serde_json::to_string_pretty(&sealed)?);
            Ok::<(), anyhow::Error>(())
        }),
        Command::Decrypt {
            key,
            iv,
            tag,
            ciphertext,
        } => block_on(async {
            let plain = scheduler.decrypt(ciphertext, key, iv, tag).await?;
            println!("{}", String::from_utf8_lossy(&plain));
            Ok::<(), anyhow::Error>(())
        }),
    };
    scheduler.shutdown();
    result
}

fn block_on<F: Future<Output = Result<()>>>(fut: F) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")?;
    rt.block_on(fut)
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("stego-sentinel.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON results.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            ensure_dir(parent)?;
            let file = std::fs::File::create(&path)
                .with_context(|| format!("create log file: {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("logs").join("stego-sentinel.log"))
}

fn doctor(cfg: &Config, scheduler: &SchedulerHandle) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "pool_sizes": {
                "analysis": cfg.scheduler.analysis_pool_size(),
                "encryption": cfg.scheduler.encryption_pool_size(),
                "hashing": cfg.scheduler.hashing_pool_size(),
            },
            "max_queued_jobs": cfg.scheduler.max_queued_jobs,
            "job_timeout_ms": cfg.scheduler.job_timeout_ms,
            "stats": scheduler.stats(),
        }))?
    );
    Ok(())
}

async fn analyze(
    cfg: &Config,
    scheduler: &SchedulerHandle,
    inputs: &[PathBuf],
    mime: Option<&str>,
) -> Result<()> {
    let mut uploads = Vec::with_capacity(inputs.len());
    let mut digests = Vec::with_capacity(inputs.len());
    for input in inputs {
        validate_input(cfg, input)?;
        let upload = probe_file(cfg, input, mime)?;
        digests.push(sha256_hex(&upload.bytes));
        uploads.push(upload);
    }

    let started = now_rfc3339();
    let pipeline = Pipeline::new(scheduler.clone());
    let outcomes = pipeline.screen_all(uploads).await;

    let rejected = outcomes.iter().filter(|o| !o.decision.admit).count();
    let results: Vec<_> = inputs
        .iter()
        .zip(digests)
        .zip(&outcomes)
        .map(|((input, sha256), outcome)| {
            serde_json::json!({
                "input": input,
                "sha256": sha256,
                "outcome": outcome,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "started": started,
            "finished": now_rfc3339(),
            "results": results,
        }))?
    );

    if rejected > 0 {
        return Err(anyhow!("{rejected} of {} uploads rejected", outcomes.len()));
    }
    info!("all {} uploads admitted", outcomes.len());
    Ok(())
}

async fn hash(cfg: &Config, scheduler: &SchedulerHandle, input: &Path) -> Result<()> {
    validate_input(cfg, input)?;
    let upload = probe_file(cfg, input, None)?;
    let digest = scheduler.hash(upload.bytes).await?;
    println!("{digest}  {}", input.display());
    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if input.extension().is_none() {
        warn!(
            "input has no extension; MIME falls back to octet-stream: {}",
            input.display()
        );
    }

    Ok(())
}
