//! Table rendering for the `sources` and `formats` subcommands.

use gpq_core::OutputFormat;
use gpq_core::catalog::{Catalog, DatasetPreset};
use tabled::{Table, Tabled};

/// Table row representation for one preset catalog entry.
#[derive(Tabled)]
pub struct SourceRow {
    /// Source category the entry belongs to (e.g. `overture`).
    #[tabled(rename = "Source")]
    source: String,
    /// Entry key within the category.
    #[tabled(rename = "Dataset")]
    key: String,
    /// Human-readable dataset name.
    #[tabled(rename = "Name")]
    display_name: String,
    /// Whether downloads from this entry are validated first.
    #[tabled(rename = "Validated")]
    needs_validation: String,
    /// Literal or templated dataset URL.
    #[tabled(rename = "URL")]
    url: String,
}

impl SourceRow {
    fn new(source: &str, key: &str, preset: &DatasetPreset) -> Self {
        Self {
            source: source.to_string(),
            key: key.to_string(),
            display_name: preset.display_name.clone().unwrap_or_default(),
            needs_validation: if preset.needs_validation.unwrap_or(true) {
                "yes".to_string()
            } else {
                "trusted".to_string()
            },
            url: preset
                .url
                .clone()
                .or_else(|| preset.url_template.clone())
                .unwrap_or_default(),
        }
    }
}

/// Render the preset catalog as a table.
#[must_use]
pub fn sources_table(catalog: &Catalog) -> String {
    let rows: Vec<SourceRow> = catalog
        .entries()
        .map(|(source, key, preset)| SourceRow::new(source, key, preset))
        .collect();
    Table::new(rows).to_string()
}

/// Table row representation for one output format.
#[derive(Tabled)]
pub struct FormatRow {
    /// Destination file extension.
    #[tabled(rename = "Extension")]
    extension: String,
    /// Full format name.
    #[tabled(rename = "Format")]
    long_name: String,
    /// Whether nested columns pass through without coercion.
    #[tabled(rename = "Native Columnar")]
    native: String,
    /// Whether the destination is the engine's database file.
    #[tabled(rename = "Database")]
    database: String,
}

/// Render the output format registry as a table.
#[must_use]
pub fn formats_table() -> String {
    let rows: Vec<FormatRow> = OutputFormat::all()
        .into_iter()
        .map(|format| FormatRow {
            extension: format!(".{}", format.extension()),
            long_name: format.long_name().to_string(),
            native: if format.is_native_columnar() {
                "yes".to_string()
            } else {
                "no".to_string()
            },
            database: if format.is_database() {
                "yes".to_string()
            } else {
                "no".to_string()
            },
        })
        .collect();
    Table::new(rows).to_string()
}
