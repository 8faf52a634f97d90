use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, BINARY};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mirrorsync::sync::{canonicalize, FingerprintAlgorithm, SyncReport};
use mirrorsync::{build_engine, MirrorConfig, PipelineConfig};

#[derive(Parser)]
#[command(name = "mirrorsync", version, about = "Mirror public datasets into an S3 bucket")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every configured mirror
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Compute plans without uploading or deleting
        #[arg(long)]
        dry_run: bool,
        /// Run only the mirror with this name
        #[arg(long)]
        only: Option<String>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a run would change
    Plan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        only: Option<String>,
    },
    /// Print the fingerprint of a local file
    Fingerprint {
        file: PathBuf,
        #[arg(short, long, default_value = "md5")]
        algorithm: FingerprintAlgorithm,
        /// Canonicalize the file as JSON before hashing
        #[arg(long)]
        canonical_json: bool,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mirrorsync=debug" } else { "mirrorsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run { config, dry_run, only, json } => run(&config, dry_run, only.as_deref(), json).await,
        Command::Plan { config, only } => plan(&config, only.as_deref()).await,
        Command::Fingerprint { file, algorithm, canonical_json, json } => {
            fingerprint_file(&file, algorithm, canonical_json, json)
        }
    }
}

fn selected(path: &Path, only: Option<&str>) -> Result<Vec<MirrorConfig>> {
    let pipeline = PipelineConfig::load(path)?;
    let mirrors = match only {
        Some(name) => match pipeline.mirror(name) {
            Some(mirror) => vec![mirror.clone()],
            None => bail!("No mirror named {:?} in {}", name, path.display()),
        },
        None => pipeline.mirrors,
    };
    if mirrors.is_empty() {
        bail!("No mirrors configured in {}", path.display());
    }
    Ok(mirrors)
}

async fn run(path: &Path, dry_run: bool, only: Option<&str>, json: bool) -> Result<()> {
    let mirrors = selected(path, only)?;
    let mut reports: Vec<SyncReport> = Vec::new();
    let mut fatal = 0usize;

    for mut config in mirrors {
        config.dry_run |= dry_run;
        let engine = build_engine(&config).with_context(|| format!("Failed to set up mirror {}", config.name))?;

        let cancel = engine.cancel_token();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing in-flight items");
                cancel.cancel();
            }
        });

        let result = engine.run(&config.bucket_prefix).await;
        watcher.abort();

        match result {
            Ok(report) => {
                if !json {
                    print_report(&report);
                }
                reports.push(report);
            }
            Err(err) => {
                tracing::error!(mirror = %config.name, error = %err, "Mirror failed");
                fatal += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let partial = reports.iter().filter(|r| r.is_partial()).count();
    if fatal > 0 || partial > 0 {
        bail!("{} mirror(s) failed, {} finished with item failures", fatal, partial);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{}", report.summary());
    println!("  uploaded {} in {} ms", format_size(report.bytes_uploaded, BINARY), report.duration_ms);
    for failed in &report.failed {
        println!(
            "  failed {} ({:?}, {}{}): {}",
            failed.name,
            failed.action,
            failed.kind,
            if failed.retryable { ", retryable" } else { "" },
            failed.message
        );
    }
}

async fn plan(path: &Path, only: Option<&str>) -> Result<()> {
    for config in selected(path, only)? {
        let engine = build_engine(&config).with_context(|| format!("Failed to set up mirror {}", config.name))?;
        let discovery = engine
            .plan(&config.bucket_prefix)
            .await
            .with_context(|| format!("Failed to plan mirror {}", config.name))?;
        let plan = &discovery.plan;

        println!(
            "{}: upload={} delete={} skip={}",
            config.name,
            plan.to_upload.len(),
            plan.to_delete.len(),
            plan.to_skip.len()
        );
        for (name, upload) in &plan.to_upload {
            println!("  + {} ({:?})", name, upload.reason);
        }
        for name in &plan.to_delete {
            println!("  - {}", name);
        }
        for failed in &discovery.remote.failures {
            println!("  ! {} could not be fetched: {}", failed.name, failed.message);
        }
    }
    Ok(())
}

fn fingerprint_file(file: &Path, algorithm: FingerprintAlgorithm, canonical_json: bool, json: bool) -> Result<()> {
    let mut data = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if canonical_json {
        data = canonicalize(&data).with_context(|| format!("{} is not valid JSON", file.display()))?;
    }
    let digest = algorithm.fingerprint(&data);

    if json {
        let value = serde_json::json!({
            "file": file.display().to_string(),
            "algorithm": algorithm.name(),
            "fingerprint": digest,
            "size": data.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}  {}  {}", digest, algorithm, file.display());
    }
    Ok(())
}
