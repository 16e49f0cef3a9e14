//! Persistence layer for the Argo ETL.
//!
//! Provides the normalized PostgreSQL schema (platform, source file,
//! profile, variable, measurement), the `Catalog` connection/migration
//! handle, and the natural-key upsert and bulk-append operations the
//! loader composes inside one per-file transaction.

pub mod catalog;

pub use catalog::{
    insert_measurements, upsert_platform, upsert_profiles, upsert_source_file, upsert_variable,
    Catalog, MeasurementRow,
};
