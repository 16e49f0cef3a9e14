//! Common types shared across the Argo ETL crates.

pub mod error;
pub mod records;

pub use error::{ArgoError, ArgoResult};
pub use records::{
    MeasurementFact, PlatformRecord, ProfileRecord, SourceFileRecord, VariableRecord,
};
