//! Ingestion pipeline: file discovery, bounded fan-out, per-file isolation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use argo_common::ArgoError;
use profile_decoder::{decode_profile_file, DecodeOptions};
use storage::Catalog;

use crate::config::EtlConfig;
use crate::error::{IngestionError, Result};
use crate::loader::{self, LoadOutcome};

/// Main ingestion pipeline.
///
/// Each worker processes one whole file end-to-end (decode + load) before
/// taking the next; files are never split across workers.
pub struct IngestionPipeline {
    config: EtlConfig,
    catalog: Catalog,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
}

/// Aggregate totals of one ingestion run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub files_attempted: usize,
    pub files_succeeded: usize,
    pub failures: Vec<FileFailure>,
    pub profiles_upserted: usize,
    pub measurements_inserted: u64,
    pub profiles_skipped: usize,
    pub facts_dropped: usize,
}

/// One failed file with its cause, as reported to the CLI layer.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

impl RunSummary {
    /// Whether every attempted file was ingested.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: PathBuf, result: Result<LoadOutcome>) {
        self.files_attempted += 1;
        match result {
            Ok(outcome) => {
                self.files_succeeded += 1;
                self.profiles_upserted += outcome.profiles_upserted;
                self.measurements_inserted += outcome.measurements_inserted;
                self.profiles_skipped += outcome.profiles_skipped;
                self.facts_dropped += outcome.facts_dropped;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File ingestion failed");
                self.failures.push(FileFailure {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

impl IngestionPipeline {
    /// Connect the catalog, run migrations, and size the worker pool.
    pub async fn new(config: &EtlConfig) -> Result<Self> {
        // Each worker holds one connection for the duration of its file.
        let catalog =
            Catalog::connect(&config.database_url, config.max_workers as u32 + 1).await?;
        catalog.migrate().await?;

        Ok(Self {
            config: config.clone(),
            catalog,
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between file dispatches. Files already admitted to a
    /// worker finish or fail through their normal transactional path.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the pipeline over every discovered input file.
    ///
    /// Per-file failures are recorded in the summary and never abort the
    /// run; finding no input files at all is fatal.
    pub async fn run(&self) -> Result<RunSummary> {
        let files = discover_files(&self.config.input_dir, &self.config.include_patterns)?;
        if files.is_empty() {
            return Err(IngestionError::NoInputFiles {
                root: self.config.input_dir.display().to_string(),
                patterns: self.config.include_patterns.clone(),
            });
        }

        info!(
            files = files.len(),
            workers = self.config.max_workers,
            "Starting ingestion run"
        );

        let results: Vec<Option<(PathBuf, Result<LoadOutcome>)>> = stream::iter(files)
            .map(|path| async move {
                if self.shutdown.load(Ordering::SeqCst) {
                    warn!(path = %path.display(), "Shutdown requested, file not admitted");
                    return None;
                }
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = self.semaphore.acquire().await.ok()?;
                let result = self.ingest_file(&path).await;
                Some((path, result))
            })
            .buffer_unordered(self.config.max_workers)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (path, result) in results.into_iter().flatten() {
            summary.record(path, result);
        }

        info!(
            attempted = summary.files_attempted,
            succeeded = summary.files_succeeded,
            failed = summary.failures.len(),
            profiles = summary.profiles_upserted,
            measurements = summary.measurements_inserted,
            "Ingestion run complete"
        );

        Ok(summary)
    }

    /// Decode and load one file within a single transaction.
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn ingest_file(&self, path: &Path) -> Result<LoadOutcome> {
        let options = DecodeOptions {
            variable_whitelist: self.config.variables_whitelist.clone(),
        };
        let parsed =
            decode_profile_file(path, &options).map_err(|source| IngestionError::Decode {
                path: path.display().to_string(),
                source,
            })?;

        let mut tx = self.catalog.begin().await?;
        let outcome = match loader::load_parsed_file(&mut tx, &parsed, &self.config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Discard everything this file wrote; earlier files'
                // commits are untouched.
                tx.rollback().await.ok();
                return Err(e);
            }
        };
        tx.commit()
            .await
            .map_err(|e| ArgoError::Database(format!("Commit failed: {}", e)))?;

        info!(
            profiles = outcome.profiles_upserted,
            measurements = outcome.measurements_inserted,
            "Ingested file"
        );
        Ok(outcome)
    }
}

/// Discover candidate files under `root` matching any of `patterns`,
/// deduplicated and sorted.
pub fn discover_files(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if patterns.iter().any(|p| glob_match(p, &name)) {
            files.insert(entry.into_path());
        }
    }

    Ok(files.into_iter().collect())
}

/// Filename glob matching supporting `*` and `?`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ni;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ni = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
