//! Error types for the ingestion crate.

use thiserror::Error;

use profile_decoder::DecodeError;

/// Errors that can occur during ingestion.
///
/// Per-file errors (`Decode`, `Storage`) are caught at the pipeline
/// boundary and reported in the run summary; the remaining variants are
/// fatal to the whole run.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Storage(#[from] argo_common::ArgoError),

    #[error("No input files matched {patterns:?} under {root}")]
    NoInputFiles { root: String, patterns: Vec<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to scan input directory: {0}")]
    Discovery(#[from] walkdir::Error),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
