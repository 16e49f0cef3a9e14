//! Error types for profile file decoding.

use thiserror::Error;

/// Result type for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that make a whole file undecodable.
///
/// Per-variable read failures are not represented here: a variable whose
/// data cannot be read as floats is skipped, and the rest of the file
/// decodes normally.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    #[error("No recognizable profile dimension (tried {tried})")]
    MissingProfileAxis { tried: String },
}
