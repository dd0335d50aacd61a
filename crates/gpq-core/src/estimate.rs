//! Output size estimation for GeoJSON destinations.
//!
//! Serializing a large staging table to a text feature collection can
//! produce files an order of magnitude bigger than the columnar source, so
//! before writing GeoJSON the job samples the staging table, measures the
//! average serialized feature length, and extrapolates. The result is a
//! heuristic: a failed estimate degrades to zero and the download proceeds.

use log::{debug, warn};

use crate::engine::{EngineError, SqlEngine, Value};
use crate::query::STAGING_TABLE;
use crate::schema::SchemaColumn;

/// Warn when the estimated GeoJSON output exceeds this many megabytes.
pub const SIZE_WARNING_THRESHOLD_MB: f64 = 4096.0;

/// How many staging rows at most feed the average feature length.
const SAMPLE_ROWS: i64 = 100;

/// Fixed overhead of `{"type":"FeatureCollection","features":[]}`.
const COLLECTION_OVERHEAD_BYTES: f64 = 50.0;

/// Estimate the serialized size of the staging table as GeoJSON, in MB.
///
/// Returns `0.0` on any failure; the caller proceeds without the estimate.
#[must_use]
pub fn estimate_geojson_size_mb(engine: &mut dyn SqlEngine) -> f64 {
    match try_estimate(engine) {
        Ok(estimated) => estimated,
        Err(e) => {
            warn!("Error estimating file size: {e}");
            0.0
        },
    }
}

fn try_estimate(engine: &mut dyn SqlEngine) -> Result<f64, EngineError> {
    let count_sql = format!("SELECT COUNT(*) FROM {STAGING_TABLE}");
    let row_count = engine
        .query(&count_sql)?
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let sample_size = SAMPLE_ROWS.min(row_count);
    if sample_size == 0 {
        return Ok(0.0);
    }

    let describe_sql = format!("DESCRIBE {STAGING_TABLE}");
    let columns: Vec<SchemaColumn> = engine
        .query(&describe_sql)?
        .iter()
        .filter_map(SchemaColumn::from_row)
        .collect();

    let properties = columns
        .iter()
        .filter(|column| column.name != "geometry")
        .map(|column| {
            format!(
                "'{name}', COALESCE(CAST({name} AS VARCHAR), 'null')",
                name = column.name
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    let sample_sql = format!(
        "WITH sample AS (SELECT * FROM {STAGING_TABLE} LIMIT {sample_size}) \
         SELECT AVG(LENGTH(json_object('type', 'Feature', 'geometry', ST_AsGeoJSON(geometry), \
         'properties', json_object({properties}))::VARCHAR)) AS avg_feature_size FROM sample;"
    );
    debug!("Executing SQL query: {sample_sql}");

    let avg_feature_size = engine
        .query(&sample_sql)?
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_f64);

    let Some(avg_feature_size) = avg_feature_size else {
        return Ok(0.0);
    };

    #[allow(clippy::cast_precision_loss)]
    let rows = row_count as f64;
    let comma_overhead = rows - 1.0;
    let total_bytes = rows * avg_feature_size + COLLECTION_OVERHEAD_BYTES + comma_overhead;
    Ok(total_bytes / (1024.0 * 1024.0))
}
