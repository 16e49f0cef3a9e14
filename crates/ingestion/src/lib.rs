//! Argo profile ingestion library.
//!
//! Provides the core logic for ingesting Argo profiling-float NetCDF files
//! into the normalized PostgreSQL schema.
//!
//! # Architecture
//!
//! Data flows strictly decoder → loader → store, one file at a time per
//! worker:
//!
//! - file discovery and bounded-concurrency fan-out ([`pipeline`])
//! - per-file transactional loading with natural-key upserts ([`loader`])
//! - run configuration assembled once at startup ([`config`])
//!
//! Per-file failures are isolated and reported in the [`RunSummary`]; only
//! run-level preconditions (no input files, store unreachable) are fatal.

pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;

// Re-exports
pub use config::EtlConfig;
pub use error::{IngestionError, Result};
pub use loader::{load_parsed_file, LoadOutcome};
pub use pipeline::{discover_files, FileFailure, IngestionPipeline, RunSummary};
