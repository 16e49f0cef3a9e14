//! Decoding of one Argo profile NetCDF file into in-memory records.
//!
//! The decoder reads the file with the native netcdf library and produces
//! five facets: the platform, its profiles, the variable catalog, the
//! sparse measurement facts, and the source-file metadata. It has no side
//! effects beyond reading the file.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Once;

use tracing::debug;

use argo_common::{
    MeasurementFact, PlatformRecord, ProfileRecord, SourceFileRecord, VariableRecord,
};

use crate::axes::{self, is_axis, resolve_dimension, resolve_variable};
use crate::error::{DecodeError, DecodeResult};
use crate::time::{decode_time_values, parse_launch_date};

/// Name suffixes marking companion fields of a base variable. Companions
/// are attached to their base variable's facts and never cataloged as
/// variables themselves.
const COMPANION_SUFFIXES: &[&str] = &["_QC", "_ADJUSTED", "_ADJUSTED_QC", "_ADJUSTED_ERROR"];

/// Options controlling what the decoder emits.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Restrict the variable catalog to these names. `None` or empty means
    /// every eligible variable is decoded.
    pub variable_whitelist: Option<HashSet<String>>,
}

impl DecodeOptions {
    fn admits(&self, name: &str) -> bool {
        match &self.variable_whitelist {
            Some(set) if !set.is_empty() => set.contains(name),
            _ => true,
        }
    }
}

/// Decoded representation of one profile file.
#[derive(Debug, Clone)]
pub struct ParsedProfileFile {
    pub platform: PlatformRecord,
    pub profiles: Vec<ProfileRecord>,
    pub variables: Vec<VariableRecord>,
    pub facts: Vec<MeasurementFact>,
    pub file: SourceFileRecord,
}

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics to stderr even when errors
/// are handled gracefully (e.g. probing for an optional attribute). Safe to
/// call multiple times; only the first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are the
        // documented way to disable automatic error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Decode one Argo profile NetCDF file.
///
/// Fails only when the file cannot be opened or has no recognizable profile
/// dimension. A file with zero eligible variables decodes to an empty
/// variable catalog and fact set.
pub fn decode_profile_file(path: &Path, options: &DecodeOptions) -> DecodeResult<ParsedProfileFile> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| DecodeError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let n_prof = resolve_dimension(&file, axes::PROFILE_AXIS).ok_or_else(|| {
        DecodeError::MissingProfileAxis {
            tried: axes::PROFILE_AXIS.join(", "),
        }
    })?;
    // Single-level data carries no depth axis at all.
    let n_levels = resolve_dimension(&file, axes::LEVEL_AXIS).unwrap_or(0);

    let platform = decode_platform(&file);
    let profiles = decode_profiles(&file, n_prof);
    let (variables, facts) = decode_facts(&file, &profiles, n_prof, n_levels, options);

    let file_record = SourceFileRecord {
        path: normalize_path(path),
        md5: None,
        version: global_str_attr(&file, "history"),
    };

    debug!(
        path = %file_record.path,
        profiles = profiles.len(),
        variables = variables.len(),
        facts = facts.len(),
        "Decoded profile file"
    );

    Ok(ParsedProfileFile {
        platform,
        profiles,
        variables,
        facts,
        file: file_record,
    })
}

/// Whether `name` is a companion field rather than a base variable.
pub fn is_companion(name: &str) -> bool {
    COMPANION_SUFFIXES.iter().any(|s| name.ends_with(s))
}

// ---------------------------------------------------------------------------
// Platform facet
// ---------------------------------------------------------------------------

fn decode_platform(file: &netcdf::File) -> PlatformRecord {
    let wmo_id = decode_platform_id(file).unwrap_or_default();

    PlatformRecord {
        wmo_id,
        platform_type: global_str_attr(file, "PLATFORM_TYPE"),
        dac: global_str_attr(file, "DAC"),
        maker: global_str_attr(file, "MANUFACTURER"),
        launch_date: global_str_attr(file, "LAUNCH_DATE")
            .as_deref()
            .and_then(parse_launch_date),
    }
}

/// Reconstruct the platform identifier.
///
/// Tried in order: global attribute, fixed-width character-code variable
/// (null codes dropped, whitespace trimmed), raw numeric rendering.
fn decode_platform_id(file: &netcdf::File) -> Option<String> {
    if let Some(s) = global_str_attr(file, "PLATFORM_NUMBER") {
        if !s.is_empty() {
            return Some(s);
        }
    }

    let var = file.variable("PLATFORM_NUMBER")?;

    // Multi-profile files repeat the identifier once per profile; the first
    // row is authoritative.
    let codes: Option<Vec<u8>> = if var.dimensions().len() >= 2 {
        var.get_values::<u8, _>((0, ..)).ok()
    } else {
        var.get_values::<u8, _>(..).ok()
    };
    if let Some(codes) = codes {
        if let Some(s) = decode_char_codes(&codes) {
            return Some(s);
        }
    }

    var.get_values::<i64, _>(..)
        .ok()
        .and_then(|values| values.first().map(|v| v.to_string()))
}

/// Drop null padding from a fixed-width character array and trim.
pub fn decode_char_codes(codes: &[u8]) -> Option<String> {
    let s: String = codes
        .iter()
        .filter(|&&c| c != 0)
        .map(|&c| char::from(c))
        .collect();
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ---------------------------------------------------------------------------
// Profile facet
// ---------------------------------------------------------------------------

fn decode_profiles(file: &netcdf::File, n_prof: usize) -> Vec<ProfileRecord> {
    let cycle = file
        .variable("CYCLE_NUMBER")
        .and_then(|v| read_f64_values(&v).map(|data| (data, fill_value(&v))));

    let latitude = file
        .variable("LATITUDE")
        .and_then(|v| read_f64_values(&v).map(|data| (data, fill_value(&v))));
    let longitude = file
        .variable("LONGITUDE")
        .and_then(|v| read_f64_values(&v).map(|data| (data, fill_value(&v))));

    let times = match resolve_variable(file, axes::TIME_VARIABLE) {
        Some(v) => {
            let units = var_str_attr(&v, "units");
            let fill = fill_value(&v);
            match read_f64_values(&v) {
                Some(values) => decode_time_values(&values, units.as_deref(), fill),
                None => vec![None; n_prof],
            }
        }
        None => vec![None; n_prof],
    };

    let position_qc = file
        .variable("POSITION_QC")
        .and_then(|v| v.get_values::<u8, _>(..).ok())
        .map(|codes| codes.iter().map(|&c| qc_char(c)).collect::<Vec<_>>());

    (0..n_prof)
        .map(|i| {
            let cycle_number = match &cycle {
                Some((values, fill)) => values
                    .get(i)
                    .copied()
                    .filter(|v| !is_missing(*v, *fill))
                    .map(|v| v as i32),
                // No cycle variable at all: fall back to the positional index.
                None => Some(i as i32),
            };

            ProfileRecord {
                cycle_number,
                time: times.get(i).copied().flatten(),
                latitude: grid_value(&latitude, i),
                longitude: grid_value(&longitude, i),
                position_qc: position_qc
                    .as_ref()
                    .and_then(|codes| codes.get(i).cloned().flatten()),
            }
        })
        .collect()
}

fn grid_value(data: &Option<(Vec<f64>, Option<f64>)>, i: usize) -> Option<f64> {
    let (values, fill) = data.as_ref()?;
    values.get(i).copied().filter(|v| !is_missing(*v, *fill))
}

// ---------------------------------------------------------------------------
// Variable catalog + fact expansion
// ---------------------------------------------------------------------------

fn decode_facts(
    file: &netcdf::File,
    profiles: &[ProfileRecord],
    n_prof: usize,
    n_levels: usize,
    options: &DecodeOptions,
) -> (Vec<VariableRecord>, Vec<MeasurementFact>) {
    let mut variables = Vec::new();
    let mut facts = Vec::new();

    let pressure = resolve_variable(file, axes::PRESSURE_VARIABLE)
        .and_then(|v| read_f64_values(&v).map(|data| (data, fill_value(&v))));

    for var in file.variables() {
        let name = var.name();
        if !is_profile_level_grid(&var) || is_companion(&name) {
            continue;
        }
        if !options.admits(&name) {
            debug!(variable = %name, "Variable not in whitelist, skipping");
            continue;
        }

        // Character grids and other non-numeric layouts fail the float read
        // and are not measured quantities.
        let Some(data) = read_f64_values(&var) else {
            continue;
        };
        let fill = fill_value(&var);

        variables.push(VariableRecord {
            name: name.clone(),
            standard_name: var_str_attr(&var, "standard_name"),
            long_name: var_str_attr(&var, "long_name"),
            units: var_str_attr(&var, "units"),
        });

        // Companion fields located by name-suffix convention; any of them
        // may be absent.
        let qc = read_qc_grid(file, &format!("{name}_QC"));
        let adjusted = file
            .variable(&format!("{name}_ADJUSTED"))
            .and_then(|v| read_f64_values(&v).map(|data| (data, fill_value(&v))));
        let adjusted_qc = read_qc_grid(file, &format!("{name}_ADJUSTED_QC"));

        let levels = levels_in_grid(data.len(), n_prof, n_levels);
        for iprof in 0..n_prof {
            let Some(cycle_number) = profiles.get(iprof).and_then(|p| p.cycle_number) else {
                // Profiles without a usable cycle number are skipped along
                // with their facts.
                continue;
            };
            for ilev in 0..levels {
                let idx = iprof * levels + ilev;
                let Some(&value) = data.get(idx) else {
                    break;
                };
                // A missing raw value means "no row", even when an adjusted
                // value exists for the cell.
                if is_missing(value, fill) {
                    continue;
                }

                facts.push(MeasurementFact {
                    cycle_number,
                    variable_name: name.clone(),
                    level_index: ilev as i32,
                    pressure_dbar: pressure.as_ref().and_then(|(values, fill)| {
                        values.get(idx).copied().filter(|v| !is_missing(*v, *fill))
                    }),
                    value,
                    value_qc: qc.as_ref().and_then(|g| g.get(idx).cloned().flatten()),
                    adjusted_value: adjusted.as_ref().and_then(|(values, fill)| {
                        values.get(idx).copied().filter(|v| !is_missing(*v, *fill))
                    }),
                    adjusted_qc: adjusted_qc
                        .as_ref()
                        .and_then(|g| g.get(idx).cloned().flatten()),
                });
            }
        }
    }

    (variables, facts)
}

/// Eligibility: dimensioned exactly (profile axis, level axis).
fn is_profile_level_grid(var: &netcdf::Variable) -> bool {
    let dims = var.dimensions();
    dims.len() == 2
        && is_axis(&dims[0].name(), axes::PROFILE_AXIS)
        && is_axis(&dims[1].name(), axes::LEVEL_AXIS)
}

/// Depth-level count actually present in a flat grid. Files that declare no
/// level axis still carry one implicit level per profile.
fn levels_in_grid(len: usize, n_prof: usize, n_levels: usize) -> usize {
    if n_levels > 0 {
        n_levels
    } else if n_prof > 0 {
        len / n_prof
    } else {
        0
    }
}

fn read_qc_grid(file: &netcdf::File, name: &str) -> Option<Vec<Option<String>>> {
    let var = file.variable(name)?;
    let codes = var.get_values::<u8, _>(..).ok()?;
    Some(codes.iter().map(|&c| qc_char(c)).collect())
}

/// A quality flag is one character; NUL and blank mean absent.
fn qc_char(code: u8) -> Option<String> {
    if code == 0 || code == b' ' {
        None
    } else {
        Some(char::from(code).to_string())
    }
}

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

fn read_f64_values(var: &netcdf::Variable) -> Option<Vec<f64>> {
    match var.get_values::<f64, _>(..) {
        Ok(values) => Some(values),
        Err(e) => {
            debug!(variable = %var.name(), error = %e, "Variable not readable as floats, skipping");
            None
        }
    }
}

/// A value is missing when it is non-finite or equals the declared
/// `_FillValue` sentinel.
fn is_missing(value: f64, fill: Option<f64>) -> bool {
    !value.is_finite() || fill.map_or(false, |f| value == f)
}

fn fill_value(var: &netcdf::Variable) -> Option<f64> {
    var_f64_attr(var, "_FillValue")
}

/// Check attribute presence first to avoid HDF5 error probing.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn var_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn var_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => non_blank(s),
        _ => None,
    }
}

fn global_str_attr(file: &netcdf::File, name: &str) -> Option<String> {
    let attr = file.attribute(name)?;
    match attr.value().ok()? {
        netcdf::AttributeValue::Str(s) => non_blank(s),
        _ => None,
    }
}

fn non_blank(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Natural key of the source file: the canonical path when resolvable.
fn normalize_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_companion_suffixes() {
        assert!(is_companion("TEMP_QC"));
        assert!(is_companion("TEMP_ADJUSTED"));
        assert!(is_companion("TEMP_ADJUSTED_QC"));
        assert!(is_companion("PSAL_ADJUSTED_ERROR"));
        assert!(!is_companion("TEMP"));
        assert!(!is_companion("PRES"));
    }

    #[test]
    fn test_decode_char_codes_drops_nulls_and_trims() {
        let codes = b"5904471\0\0 ";
        assert_eq!(decode_char_codes(codes).as_deref(), Some("5904471"));
    }

    #[test]
    fn test_decode_char_codes_all_padding() {
        assert!(decode_char_codes(&[0, 0, b' ', 0]).is_none());
        assert!(decode_char_codes(&[]).is_none());
    }

    #[test]
    fn test_is_missing_fill_and_nan() {
        assert!(is_missing(f64::NAN, None));
        assert!(is_missing(99_999.0, Some(99_999.0)));
        assert!(!is_missing(3.5, Some(99_999.0)));
        assert!(!is_missing(3.5, None));
    }

    #[test]
    fn test_qc_char_blank_is_absent() {
        assert_eq!(qc_char(b'1').as_deref(), Some("1"));
        assert!(qc_char(b' ').is_none());
        assert!(qc_char(0).is_none());
    }

    #[test]
    fn test_levels_in_grid_without_level_axis() {
        assert_eq!(levels_in_grid(6, 2, 3), 3);
        assert_eq!(levels_in_grid(4, 2, 0), 2);
        assert_eq!(levels_in_grid(0, 0, 0), 0);
    }

    #[test]
    fn test_whitelist_admission() {
        let all = DecodeOptions::default();
        assert!(all.admits("TEMP"));

        let empty = DecodeOptions {
            variable_whitelist: Some(HashSet::new()),
        };
        assert!(empty.admits("TEMP"));

        let restricted = DecodeOptions {
            variable_whitelist: Some(["TEMP".to_string()].into_iter().collect()),
        };
        assert!(restricted.admits("TEMP"));
        assert!(!restricted.admits("PSAL"));
    }
}
