//! Entity records exchanged between the decoder and the store.
//!
//! Each record mirrors one table of the normalized schema. Fields that a
//! source file may legitimately omit are option-typed; the store's upsert
//! operations treat `None` as "leave the existing value alone".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One physical profiling float, keyed by its WMO identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRecord {
    /// WMO platform number (natural key).
    pub wmo_id: String,
    pub platform_type: Option<String>,
    /// Data assembly center code.
    pub dac: Option<String>,
    pub maker: Option<String>,
    pub launch_date: Option<DateTime<Utc>>,
}

/// One ingested source file, keyed by its normalized path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileRecord {
    pub path: String,
    pub md5: Option<String>,
    /// Format/version tag, taken from the file's global `history` attribute.
    pub version: Option<String>,
}

/// One observation cycle of a platform.
///
/// `cycle_number` is `None` when the file carried a missing or unparseable
/// cycle value for this entry; such profiles are skipped at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub cycle_number: Option<i32>,
    pub time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub position_qc: Option<String>,
}

/// A named measured quantity, keyed globally by exact name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    pub units: Option<String>,
}

/// One scalar reading at one depth level of one profile.
///
/// Facts reference their parent profile by cycle number and their variable
/// by name; the loader resolves both to surrogate ids at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFact {
    pub cycle_number: i32,
    pub variable_name: String,
    pub level_index: i32,
    pub pressure_dbar: Option<f64>,
    pub value: f64,
    pub value_qc: Option<String>,
    pub adjusted_value: Option<f64>,
    pub adjusted_qc: Option<String>,
}
