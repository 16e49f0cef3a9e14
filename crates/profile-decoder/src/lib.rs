//! Decoder for Argo profiling-float NetCDF files.
//!
//! Reads one profile file with the native netcdf library and produces an
//! in-memory structured result: platform metadata, per-cycle profile
//! metadata, the catalog of measured variables, and the sparse set of
//! (profile, level, variable) measurement facts.
//!
//! # Conventions handled
//!
//! - Dimension names varying in case and abbreviation across producers
//!   ("N_PROF" vs "n_prof", "N_LEVELS" vs "N_LEVEL").
//! - Observation time as CF-style numeric offsets ("days since 1950-01-01")
//!   with a generic timestamp fallback.
//! - Platform identifiers stored as null-padded character-code arrays.
//! - Companion fields (`_QC`, `_ADJUSTED`, `_ADJUSTED_QC`) located by
//!   name-suffix convention; absent companions yield nulls, not failures.
//! - `_FillValue` sentinels and non-finite values treated as "no reading".
//!
//! # System requirements
//!
//! libhdf5-dev and libnetcdf-dev, as required by the `netcdf` crate.

pub mod axes;
mod decode;
pub mod error;
pub mod time;

pub use decode::{
    decode_profile_file, is_companion, silence_hdf5_errors, DecodeOptions, ParsedProfileFile,
};
pub use error::{DecodeError, DecodeResult};
