//! Alias-based resolution of dimensions and variables.
//!
//! Argo producers disagree on the spelling of the core axes ("N_PROF" vs
//! "n_prof", "N_LEVELS" vs "N_LEVEL"). Every lookup goes through one
//! prioritized alias list tried in order.

/// Known spellings of the profile axis, in priority order.
pub const PROFILE_AXIS: &[&str] = &["N_PROF", "n_prof"];

/// Known spellings of the depth-level axis, in priority order.
pub const LEVEL_AXIS: &[&str] = &["N_LEVELS", "n_levels", "N_LEVEL", "n_level"];

/// Known spellings of the observation-time variable.
pub const TIME_VARIABLE: &[&str] = &["JULD", "TIME"];

/// Pressure companion candidates: primary name, then the adjusted fallback.
pub const PRESSURE_VARIABLE: &[&str] = &["PRES", "PRES_ADJUSTED"];

/// Resolve a dimension length by trying each alias in order.
pub fn resolve_dimension(file: &netcdf::File, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|name| file.dimension(name).map(|d| d.len()))
}

/// Resolve a variable by trying each alias in order.
pub fn resolve_variable<'f>(
    file: &'f netcdf::File,
    aliases: &[&str],
) -> Option<netcdf::Variable<'f>> {
    aliases.iter().find_map(|name| file.variable(name))
}

/// Whether `name` is one of the known spellings of an axis.
pub fn is_axis(name: &str, aliases: &[&str]) -> bool {
    aliases.iter().any(|a| *a == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_axis_exact_match_only() {
        assert!(is_axis("N_PROF", PROFILE_AXIS));
        assert!(is_axis("n_prof", PROFILE_AXIS));
        assert!(!is_axis("N_Prof", PROFILE_AXIS));
        assert!(!is_axis("N_PROFILE", PROFILE_AXIS));
    }

    #[test]
    fn test_level_axis_covers_singular_spelling() {
        assert!(is_axis("N_LEVEL", LEVEL_AXIS));
        assert!(is_axis("n_levels", LEVEL_AXIS));
    }
}
