//! Transactional application of one decoded file to the schema store.

use std::collections::{BTreeMap, HashMap};

use sqlx::{Postgres, Transaction};
use tracing::warn;

use argo_common::{MeasurementFact, ProfileRecord};
use profile_decoder::ParsedProfileFile;
use storage::MeasurementRow;

use crate::config::EtlConfig;
use crate::error::Result;

/// Totals from loading one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub profiles_upserted: usize,
    pub measurements_inserted: u64,
    /// Profiles skipped for a missing or unparseable cycle number.
    pub profiles_skipped: usize,
    /// Facts dropped because their profile or variable did not resolve.
    pub facts_dropped: usize,
}

/// Apply one decoded file inside the caller's transaction.
///
/// Steps run in dependency order: platform → source file → variables →
/// profiles → measurements; later steps consume the surrogate ids produced
/// by earlier ones. The caller commits on success and rolls back on error,
/// so a failed file leaves no partial data.
pub async fn load_parsed_file(
    tx: &mut Transaction<'static, Postgres>,
    parsed: &ParsedProfileFile,
    config: &EtlConfig,
) -> Result<LoadOutcome> {
    let float_id = storage::upsert_platform(&mut **tx, &parsed.platform).await?;
    let file_id = storage::upsert_source_file(&mut **tx, &parsed.file).await?;

    let mut variable_ids = HashMap::with_capacity(parsed.variables.len());
    for variable in &parsed.variables {
        let id = storage::upsert_variable(&mut **tx, variable).await?;
        variable_ids.insert(variable.name.clone(), id);
    }

    let (keyed_profiles, profiles_skipped) = partition_profiles(&parsed.profiles);
    if profiles_skipped > 0 {
        warn!(
            path = %parsed.file.path,
            skipped = profiles_skipped,
            "Skipping profiles without a usable cycle number"
        );
    }

    let cycle_ids = storage::upsert_profiles(
        &mut **tx,
        float_id,
        file_id,
        &keyed_profiles,
        config.profile_chunk_size,
    )
    .await?;

    let (rows, facts_dropped) = resolve_facts(&parsed.facts, &cycle_ids, &variable_ids);
    if facts_dropped > 0 {
        warn!(
            path = %parsed.file.path,
            dropped = facts_dropped,
            "Dropping facts with an unresolved profile or variable"
        );
    }

    let measurements_inserted =
        storage::insert_measurements(&mut **tx, &rows, config.measurement_chunk_size).await?;

    Ok(LoadOutcome {
        profiles_upserted: cycle_ids.len(),
        measurements_inserted,
        profiles_skipped,
        facts_dropped,
    })
}

/// Key profiles by cycle number, counting entries without one.
///
/// Last entry wins when a file repeats a cycle: the multi-row upsert cannot
/// touch the same row twice within one statement.
fn partition_profiles(profiles: &[ProfileRecord]) -> (Vec<(i32, ProfileRecord)>, usize) {
    let mut keyed: BTreeMap<i32, ProfileRecord> = BTreeMap::new();
    let mut skipped = 0;

    for profile in profiles {
        match profile.cycle_number {
            Some(cycle) => {
                keyed.insert(cycle, profile.clone());
            }
            None => skipped += 1,
        }
    }

    (keyed.into_iter().collect(), skipped)
}

/// Resolve facts against the cycle → profile and name → variable maps,
/// counting facts that resolve to neither.
///
/// Like the profiles, resolved rows are keyed by their natural key with
/// the last entry winning: a file that repeats a cycle number would
/// otherwise produce two rows for the same (profile, variable, level)
/// cell, which the multi-row insert cannot touch twice.
fn resolve_facts(
    facts: &[MeasurementFact],
    cycle_ids: &HashMap<i32, i64>,
    variable_ids: &HashMap<String, i64>,
) -> (Vec<MeasurementRow>, usize) {
    let mut rows: BTreeMap<(i64, i64, i32), MeasurementRow> = BTreeMap::new();
    let mut dropped = 0;

    for fact in facts {
        let (Some(&profile_id), Some(&variable_id)) = (
            cycle_ids.get(&fact.cycle_number),
            variable_ids.get(&fact.variable_name),
        ) else {
            dropped += 1;
            continue;
        };

        rows.insert(
            (profile_id, variable_id, fact.level_index),
            MeasurementRow {
                profile_id,
                variable_id,
                level_index: fact.level_index,
                pressure_dbar: fact.pressure_dbar,
                value: fact.value,
                value_qc: fact.value_qc.clone(),
                adjusted_value: fact.adjusted_value,
                adjusted_qc: fact.adjusted_qc.clone(),
            },
        );
    }

    (rows.into_values().collect(), dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(cycle: Option<i32>, latitude: f64) -> ProfileRecord {
        ProfileRecord {
            cycle_number: cycle,
            time: None,
            latitude: Some(latitude),
            longitude: None,
            position_qc: None,
        }
    }

    fn fact(cycle: i32, variable: &str) -> MeasurementFact {
        MeasurementFact {
            cycle_number: cycle,
            variable_name: variable.to_string(),
            level_index: 0,
            pressure_dbar: None,
            value: 1.0,
            value_qc: None,
            adjusted_value: None,
            adjusted_qc: None,
        }
    }

    #[test]
    fn test_partition_counts_missing_cycles() {
        let (keyed, skipped) =
            partition_profiles(&[profile(Some(0), 1.0), profile(None, 2.0), profile(Some(1), 3.0)]);
        assert_eq!(skipped, 1);
        assert_eq!(keyed.iter().map(|(c, _)| *c).collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn test_partition_last_duplicate_wins() {
        let (keyed, skipped) =
            partition_profiles(&[profile(Some(3), 1.0), profile(Some(3), 9.0)]);
        assert_eq!(skipped, 0);
        assert_eq!(keyed.len(), 1);
        assert_eq!(keyed[0].1.latitude, Some(9.0));
    }

    #[test]
    fn test_resolve_dedupes_repeated_cells_last_wins() {
        let cycle_ids: HashMap<i32, i64> = [(0, 10)].into_iter().collect();
        let variable_ids: HashMap<String, i64> = [("TEMP".to_string(), 20)].into_iter().collect();

        // A file repeating a cycle number yields two facts for the same
        // (profile, variable, level) cell.
        let mut first = fact(0, "TEMP");
        first.value = 1.0;
        let mut second = fact(0, "TEMP");
        second.value = 2.0;

        let (rows, dropped) = resolve_facts(&[first, second], &cycle_ids, &variable_ids);

        assert_eq!(dropped, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2.0);
    }

    #[test]
    fn test_resolve_drops_unmapped_facts() {
        let cycle_ids: HashMap<i32, i64> = [(0, 10)].into_iter().collect();
        let variable_ids: HashMap<String, i64> = [("TEMP".to_string(), 20)].into_iter().collect();

        let facts = [
            fact(0, "TEMP"),
            fact(1, "TEMP"), // unknown cycle
            fact(0, "PSAL"), // unknown variable
        ];
        let (rows, dropped) = resolve_facts(&facts, &cycle_ids, &variable_ids);

        assert_eq!(rows.len(), 1);
        assert_eq!(dropped, 2);
        assert_eq!(rows[0].profile_id, 10);
        assert_eq!(rows[0].variable_id, 20);
    }
}
