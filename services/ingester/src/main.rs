//! Argo profile data ingester service.
//!
//! Discovers Argo float NetCDF profile files under an input directory and
//! loads them into the normalized PostgreSQL schema with bounded
//! concurrency. Exit status: 0 when fully clean, 1 when the run completed
//! with per-file failures, error when the run could not start at all.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ingestion::{EtlConfig, IngestionPipeline};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Argo float profile ingester")]
struct Args {
    /// Input directory with NetCDF files (overrides ARGO_INPUT_DIR)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Database connection URL (overrides ARGO_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Comma-separated filename patterns (overrides ARGO_INCLUDE)
    #[arg(long)]
    patterns: Option<String>,

    /// Maximum concurrently processed files (overrides ARGO_MAX_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Argo profile ingester");

    let config = build_config(&args)?;
    info!(
        input = %config.input_dir.display(),
        patterns = ?config.include_patterns,
        workers = config.max_workers,
        "Loaded configuration"
    );

    let pipeline = IngestionPipeline::new(&config).await?;

    // Ctrl-C stops admission of new files; in-flight files finish through
    // their normal transactional path.
    let shutdown = pipeline.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight files");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let summary = pipeline.run().await?;

    for failure in &summary.failures {
        warn!(path = %failure.path, error = %failure.error, "Failed file");
    }
    info!(
        attempted = summary.files_attempted,
        succeeded = summary.files_succeeded,
        failed = summary.failures.len(),
        profiles = summary.profiles_upserted,
        measurements = summary.measurements_inserted,
        profiles_skipped = summary.profiles_skipped,
        facts_dropped = summary.facts_dropped,
        "Run summary"
    );
    // Machine-readable summary for downstream consumers.
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_clean() {
        // Completed, but some files failed.
        std::process::exit(1);
    }
    Ok(())
}

/// Environment configuration with CLI overrides applied.
fn build_config(args: &Args) -> Result<EtlConfig> {
    let mut config = EtlConfig::from_env()?;

    if let Some(input) = &args.input {
        config.input_dir = input.clone();
    }
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }
    if let Some(patterns) = &args.patterns {
        config.include_patterns = patterns
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers.max(1);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["ingester"]).unwrap();
        assert!(args.input.is_none());
        assert!(args.workers.is_none());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "ingester",
            "--input",
            "/data/argo",
            "--workers",
            "8",
            "--patterns",
            "*_prof.nc",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.input.unwrap(), PathBuf::from("/data/argo"));
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.patterns.as_deref(), Some("*_prof.nc"));
        assert_eq!(args.log_level, "debug");
    }
}
