//! Output format registry.
//!
//! The materialization step supports a fixed set of destination formats,
//! selected by file extension. Each format knows whether it can receive the
//! source's nested types unchanged, whether the destination is itself a
//! database, and which options string its `COPY` statement needs.

use std::path::Path;

/// A supported destination format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Native columnar output; nested and array types pass through.
    GeoParquet,
    /// The engine's own database file; the connection is the destination.
    DuckDb,
    GeoPackage,
    FlatGeobuf,
    /// Row-oriented text feature collection; size-estimated before writing.
    GeoJson,
}

impl OutputFormat {
    /// All formats, in the order pickers list them.
    #[must_use]
    pub fn all() -> [OutputFormat; 5] {
        [
            OutputFormat::GeoParquet,
            OutputFormat::DuckDb,
            OutputFormat::GeoPackage,
            OutputFormat::FlatGeobuf,
            OutputFormat::GeoJson,
        ]
    }

    /// Select a format from a destination path's extension
    /// (case-insensitive). `None` means the extension is unsupported.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|format| format.extension() == extension)
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::GeoParquet => "parquet",
            OutputFormat::DuckDb => "duckdb",
            OutputFormat::GeoPackage => "gpkg",
            OutputFormat::FlatGeobuf => "fgb",
            OutputFormat::GeoJson => "geojson",
        }
    }

    #[must_use]
    pub fn long_name(&self) -> &'static str {
        match self {
            OutputFormat::GeoParquet => "GeoParquet",
            OutputFormat::DuckDb => "DuckDB Database",
            OutputFormat::GeoPackage => "GeoPackage",
            OutputFormat::FlatGeobuf => "FlatGeobuf",
            OutputFormat::GeoJson => "GeoJSON",
        }
    }

    /// Whether nested/array columns can be copied without projection
    /// coercions.
    #[must_use]
    pub fn is_native_columnar(&self) -> bool {
        matches!(self, OutputFormat::GeoParquet)
    }

    /// Whether the destination is the engine's own database file.
    #[must_use]
    pub fn is_database(&self) -> bool {
        matches!(self, OutputFormat::DuckDb)
    }

    /// The options clause for `COPY <staging> TO '<path>' ...`, or `None`
    /// when no copy happens (database destinations persist directly).
    #[must_use]
    pub fn copy_options(&self) -> Option<&'static str> {
        match self {
            OutputFormat::GeoParquet => Some("(FORMAT 'parquet', COMPRESSION 'ZSTD');"),
            OutputFormat::DuckDb => None,
            OutputFormat::GeoPackage => Some("(FORMAT GDAL, DRIVER 'GPKG');"),
            OutputFormat::FlatGeobuf => {
                Some("(FORMAT GDAL, DRIVER 'FlatGeobuf', SRS 'EPSG:4326');")
            },
            OutputFormat::GeoJson => Some("(FORMAT GDAL, DRIVER 'GeoJSON', SRS 'EPSG:4326');"),
        }
    }
}
