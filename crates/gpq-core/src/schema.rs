//! Remote dataset schema description and column classification.
//!
//! The schema drives two decisions: whether a cheap bbox range predicate is
//! possible, and which per-column coercions a non-columnar output format
//! needs. Columns are described with the engine's `DESCRIBE` statement over
//! the dataset's logical table.

use log::debug;

use crate::engine::{Row, SqlEngine};
use crate::error::{DownloadError, Result};
use crate::metadata;

/// One column of a described dataset.
///
/// The engine reports six descriptor slots; only the name and the declared
/// type drive behavior, the rest are carried for completeness.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    pub name: String,
    /// String-encoded type descriptor, e.g. `STRUCT(xmin DOUBLE, ...)`.
    pub declared_type: String,
    pub nullable: bool,
    pub key: Option<String>,
    pub default: Option<String>,
    pub extra: Option<String>,
}

impl SchemaColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            key: None,
            default: None,
            extra: None,
        }
    }

    /// Build a column from a `DESCRIBE` result row, if it has the expected
    /// shape.
    #[must_use]
    pub fn from_row(row: &Row) -> Option<Self> {
        let name = row.first()?.as_str()?.to_string();
        let declared_type = row.get(1)?.as_str()?.to_string();
        let nullable = row
            .get(2)
            .and_then(|v| v.as_str())
            .is_none_or(|v| v.eq_ignore_ascii_case("yes"));
        let slot = |idx: usize| {
            row.get(idx)
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
        };
        Some(Self {
            name,
            declared_type,
            nullable,
            key: slot(3),
            default: slot(4),
            extra: slot(5),
        })
    }

    /// Struct or map typed, which row-oriented writers need as JSON text.
    #[must_use]
    pub fn is_struct_or_map(&self) -> bool {
        let upper = self.declared_type.to_uppercase();
        upper.contains("STRUCT") || upper.contains("MAP")
    }

    /// Array typed (`VARCHAR[]` and friends).
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.declared_type.contains("[]")
    }

    /// The 8-bit unsigned integer type most downstream writers lack.
    #[must_use]
    pub fn is_narrow_integer(&self) -> bool {
        self.declared_type.eq_ignore_ascii_case("UTINYINT")
    }

    /// A standard GeoParquet 1.1 per-row bounding-box struct.
    #[must_use]
    pub fn is_bbox_struct(&self) -> bool {
        self.name.eq_ignore_ascii_case("bbox")
            && self.declared_type.to_lowercase().contains("struct")
    }
}

/// Describe the columns of the dataset at `dataset_url`.
///
/// # Errors
///
/// Returns [`DownloadError::SourceUnreadable`] when the engine cannot read
/// the dataset (bad URL, network failure, corrupt file, permissions).
pub fn describe(engine: &mut dyn SqlEngine, dataset_url: &str) -> Result<Vec<SchemaColumn>> {
    let sql = format!("DESCRIBE SELECT * FROM read_parquet('{dataset_url}')");
    debug!("Executing SQL query: {sql}");
    let rows = engine
        .query(&sql)
        .map_err(|e| DownloadError::SourceUnreadable {
            url: dataset_url.to_string(),
            message: e.message,
        })?;
    Ok(rows.iter().filter_map(SchemaColumn::from_row).collect())
}

/// Look for a metadata-declared bbox covering column.
///
/// Reads the per-file key/value metadata, finds the key literally named
/// `geo`, and resolves the covering path inside its JSON value. This is a
/// best-effort optimization: any failure along the way (absent key, bad
/// UTF-8, malformed JSON, missing path) is swallowed and reported as
/// "no covering found".
#[must_use]
pub fn find_bbox_covering(engine: &mut dyn SqlEngine, dataset_url: &str) -> Option<String> {
    let sql = format!("SELECT key, value FROM parquet_kv_metadata('{dataset_url}')");
    debug!("Executing SQL query: {sql}");
    let rows = engine.query(&sql).ok()?;

    for row in rows {
        let is_geo = row
            .first()
            .and_then(|v| v.as_bytes())
            .is_some_and(|key| key == b"geo");
        if !is_geo {
            continue;
        }
        let raw = row.get(1).and_then(|v| v.as_bytes())?;
        let decoded = std::str::from_utf8(raw).ok()?;
        debug!("Raw geo metadata value: {decoded}");
        if let Some(column) = metadata::bbox_column_from_geo_json(decoded) {
            return Some(column);
        }
    }
    None
}
