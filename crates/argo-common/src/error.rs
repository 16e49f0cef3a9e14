//! Error types shared across the Argo ETL crates.

use thiserror::Error;

/// Result type alias using ArgoError.
pub type ArgoResult<T> = Result<T, ArgoError>;

/// Primary error type for store-facing operations.
#[derive(Debug, Error)]
pub enum ArgoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
