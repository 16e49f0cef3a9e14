//! Normalized Argo schema over PostgreSQL.
//!
//! The upsert operations are free async functions over `&mut PgConnection`
//! so the loader can compose them inside a single transaction. Concurrent
//! workers rely on the schema's natural-key uniqueness constraints, not
//! application locks; a conflicting concurrent upsert resolves
//! last-committed-wins.

use std::collections::HashMap;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use argo_common::{
    ArgoError, ArgoResult, PlatformRecord, ProfileRecord, SourceFileRecord, VariableRecord,
};

/// Database connection pool and schema management.
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Create a new catalog connection from a database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> ArgoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| ArgoError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> ArgoResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| ArgoError::Database(format!("Migration failed: {}", e)))?;
            }
        }
        debug!("Schema migration complete");

        Ok(())
    }

    /// Begin a transaction scoped to one ingested file.
    pub async fn begin(&self) -> ArgoResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| ArgoError::Database(format!("Begin failed: {}", e)))
    }
}

/// Upsert a platform by WMO id, returning its surrogate id.
///
/// On conflict, only non-empty incoming metadata overwrites the stored
/// values; absent fields preserve what an earlier file recorded.
pub async fn upsert_platform(
    conn: &mut PgConnection,
    platform: &PlatformRecord,
) -> ArgoResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO floats (wmo_id, platform_type, dac, maker, launch_date)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (wmo_id) DO UPDATE SET
            platform_type = COALESCE(EXCLUDED.platform_type, floats.platform_type),
            dac = COALESCE(EXCLUDED.dac, floats.dac),
            maker = COALESCE(EXCLUDED.maker, floats.maker),
            launch_date = COALESCE(EXCLUDED.launch_date, floats.launch_date)
        RETURNING id
        "#,
    )
    .bind(&platform.wmo_id)
    .bind(non_empty(&platform.platform_type))
    .bind(non_empty(&platform.dac))
    .bind(non_empty(&platform.maker))
    .bind(platform.launch_date)
    .fetch_one(conn)
    .await
    .map_err(|e| ArgoError::Database(format!("Platform upsert failed: {}", e)))
}

/// Upsert a source file by normalized path, returning its surrogate id.
/// Re-ingesting a path refreshes hash/version and the ingestion timestamp.
pub async fn upsert_source_file(
    conn: &mut PgConnection,
    file: &SourceFileRecord,
) -> ArgoResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO files (path, md5, version)
        VALUES ($1, $2, $3)
        ON CONFLICT (path) DO UPDATE SET
            md5 = COALESCE(EXCLUDED.md5, files.md5),
            version = COALESCE(EXCLUDED.version, files.version),
            ingested_at = NOW()
        RETURNING id
        "#,
    )
    .bind(&file.path)
    .bind(non_empty(&file.md5))
    .bind(non_empty(&file.version))
    .fetch_one(conn)
    .await
    .map_err(|e| ArgoError::Database(format!("Source file upsert failed: {}", e)))
}

/// Upsert a variable by exact name, returning its surrogate id.
pub async fn upsert_variable(
    conn: &mut PgConnection,
    variable: &VariableRecord,
) -> ArgoResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO variables (name, standard_name, long_name, units)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO UPDATE SET
            standard_name = COALESCE(EXCLUDED.standard_name, variables.standard_name),
            long_name = COALESCE(EXCLUDED.long_name, variables.long_name),
            units = COALESCE(EXCLUDED.units, variables.units)
        RETURNING id
        "#,
    )
    .bind(&variable.name)
    .bind(non_empty(&variable.standard_name))
    .bind(non_empty(&variable.long_name))
    .bind(non_empty(&variable.units))
    .fetch_one(conn)
    .await
    .map_err(|e| ArgoError::Database(format!("Variable upsert failed: {}", e)))
}

/// Upsert profiles by (platform, cycle number) in chunks, returning the
/// cycle → profile id map. Re-ingesting a cycle overwrites its position and
/// time metadata.
///
/// Callers must pass each cycle number at most once per call; the
/// multi-row `ON CONFLICT` rejects statements that touch a row twice.
pub async fn upsert_profiles(
    conn: &mut PgConnection,
    float_id: i64,
    file_id: i64,
    profiles: &[(i32, ProfileRecord)],
    chunk_size: usize,
) -> ArgoResult<HashMap<i32, i64>> {
    let mut cycle_to_id = HashMap::with_capacity(profiles.len());

    for chunk in profiles.chunks(profile_chunk(chunk_size)) {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO profiles \
             (float_id, cycle_number, time, latitude, longitude, position_qc, file_id) ",
        );
        qb.push_values(chunk, |mut b, (cycle, profile)| {
            b.push_bind(float_id)
                .push_bind(*cycle)
                .push_bind(profile.time)
                .push_bind(profile.latitude)
                .push_bind(profile.longitude)
                .push_bind(profile.position_qc.clone())
                .push_bind(file_id);
        });
        qb.push(
            " ON CONFLICT (float_id, cycle_number) DO UPDATE SET \
             time = EXCLUDED.time, \
             latitude = EXCLUDED.latitude, \
             longitude = EXCLUDED.longitude, \
             position_qc = EXCLUDED.position_qc, \
             file_id = EXCLUDED.file_id \
             RETURNING id, cycle_number",
        );

        let rows: Vec<(i64, i32)> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| ArgoError::Database(format!("Profile upsert failed: {}", e)))?;

        for (id, cycle) in rows {
            cycle_to_id.insert(cycle, id);
        }
    }

    Ok(cycle_to_id)
}

/// One measurement ready for insertion, with parent ids resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub profile_id: i64,
    pub variable_id: i64,
    pub level_index: i32,
    pub pressure_dbar: Option<f64>,
    pub value: f64,
    pub value_qc: Option<String>,
    pub adjusted_value: Option<f64>,
    pub adjusted_qc: Option<String>,
}

/// Bulk-append measurement rows in bounded chunks, returning rows written.
///
/// The (profile, variable, level) key is unique; re-ingesting a cell
/// refreshes its values instead of duplicating the row.
pub async fn insert_measurements(
    conn: &mut PgConnection,
    rows: &[MeasurementRow],
    chunk_size: usize,
) -> ArgoResult<u64> {
    let mut written = 0u64;

    for chunk in rows.chunks(measurement_chunk(chunk_size)) {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO measurements \
             (profile_id, variable_id, level_index, pressure_dbar, \
              value, value_qc, adjusted_value, adjusted_qc) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.profile_id)
                .push_bind(row.variable_id)
                .push_bind(row.level_index)
                .push_bind(row.pressure_dbar)
                .push_bind(row.value)
                .push_bind(row.value_qc.clone())
                .push_bind(row.adjusted_value)
                .push_bind(row.adjusted_qc.clone());
        });
        qb.push(
            " ON CONFLICT (profile_id, variable_id, level_index) DO UPDATE SET \
             pressure_dbar = EXCLUDED.pressure_dbar, \
             value = EXCLUDED.value, \
             value_qc = EXCLUDED.value_qc, \
             adjusted_value = EXCLUDED.adjusted_value, \
             adjusted_qc = EXCLUDED.adjusted_qc",
        );

        let result = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| ArgoError::Database(format!("Measurement insert failed: {}", e)))?;
        written += result.rows_affected();
    }

    Ok(written)
}

/// Incoming empty/blank strings never overwrite stored metadata.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// PostgreSQL caps bind parameters at 65535 per statement; profiles bind 7
// columns per row, measurements 8.
fn profile_chunk(requested: usize) -> usize {
    requested.clamp(1, 9_000)
}

fn measurement_chunk(requested: usize) -> usize {
    requested.clamp(1, 8_000)
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS floats (
    id BIGSERIAL PRIMARY KEY,
    wmo_id TEXT NOT NULL UNIQUE,
    platform_type TEXT,
    dac TEXT,
    maker TEXT,
    launch_date TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS files (
    id BIGSERIAL PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    md5 TEXT,
    version TEXT,
    ingested_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS profiles (
    id BIGSERIAL PRIMARY KEY,
    float_id BIGINT NOT NULL REFERENCES floats(id) ON DELETE CASCADE,
    cycle_number INTEGER NOT NULL,
    time TIMESTAMPTZ,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    position_qc VARCHAR(8),
    file_id BIGINT REFERENCES files(id) ON DELETE SET NULL,

    UNIQUE (float_id, cycle_number)
);

CREATE TABLE IF NOT EXISTS variables (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    standard_name TEXT,
    long_name TEXT,
    units TEXT
);

CREATE TABLE IF NOT EXISTS measurements (
    id BIGSERIAL PRIMARY KEY,
    profile_id BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    variable_id BIGINT NOT NULL REFERENCES variables(id) ON DELETE CASCADE,
    level_index INTEGER NOT NULL,
    pressure_dbar DOUBLE PRECISION,
    value DOUBLE PRECISION,
    value_qc VARCHAR(8),
    adjusted_value DOUBLE PRECISION,
    adjusted_qc VARCHAR(8),

    UNIQUE (profile_id, variable_id, level_index)
);

CREATE INDEX IF NOT EXISTS idx_profiles_float ON profiles(float_id);
CREATE INDEX IF NOT EXISTS idx_profiles_time ON profiles(time DESC);
CREATE INDEX IF NOT EXISTS idx_measurements_profile ON measurements(profile_id);
CREATE INDEX IF NOT EXISTS idx_measurements_variable ON measurements(variable_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_filters_blank_strings() {
        assert_eq!(non_empty(&Some("APEX".to_string())), Some("APEX"));
        assert_eq!(non_empty(&Some("  aoml ".to_string())), Some("aoml"));
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&Some("   ".to_string())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[test]
    fn test_chunk_sizes_bounded_by_bind_limit() {
        assert_eq!(measurement_chunk(0), 1);
        assert_eq!(measurement_chunk(5_000), 5_000);
        assert_eq!(measurement_chunk(1_000_000), 8_000);
        assert_eq!(profile_chunk(500), 500);
        assert_eq!(profile_chunk(1_000_000), 9_000);
    }
}
