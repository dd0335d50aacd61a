//! Source validation.
//!
//! Before a download is queued the source is checked once: can its schema be
//! described at all, and does it carry a bbox covering for cheap spatial
//! filtering? Trusted catalog sources skip the check entirely. A readable
//! dataset without any covering is not a failure: the caller is asked
//! whether to proceed with the slower geometry-intersection fallback, and
//! the answer becomes the final report.

use crate::catalog::Catalog;
use crate::engine::SqlEngine;
use crate::error::Result;
use crate::events::EventSender;
use crate::schema::{self, SchemaColumn};

/// The validation knowledge a download job consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Described columns; absent for trusted sources until the job attaches
    /// them.
    pub schema: Option<Vec<SchemaColumn>>,
    pub has_bbox_covering: bool,
    /// Name of the covering struct column, when one exists.
    pub bbox_column: Option<String>,
}

impl ValidationReport {
    /// The trusted-source assumption: a standard `bbox` column exists.
    #[must_use]
    pub fn trusted() -> Self {
        Self {
            schema: None,
            has_bbox_covering: true,
            bbox_column: Some("bbox".to_string()),
        }
    }

    /// Report for a covering found under `column`.
    #[must_use]
    pub fn with_bbox(schema: Vec<SchemaColumn>, column: impl Into<String>) -> Self {
        Self {
            schema: Some(schema),
            has_bbox_covering: true,
            bbox_column: Some(column.into()),
        }
    }

    /// Report for a source the user accepted despite the missing covering.
    #[must_use]
    pub fn without_bbox(schema: Option<Vec<SchemaColumn>>) -> Self {
        Self {
            schema,
            has_bbox_covering: false,
            bbox_column: None,
        }
    }

    /// Attach a lazily described schema (trusted presets skip describe at
    /// validation time).
    pub fn attach_schema(&mut self, schema: Vec<SchemaColumn>) {
        self.schema = Some(schema);
    }
}

/// Outcome of validating one dataset URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The source is usable as-is.
    Ready(ValidationReport),
    /// The source is readable but has no bbox covering; the caller must
    /// confirm the slower fallback before a report exists. Accepting means
    /// `ValidationReport::without_bbox(Some(schema))`.
    NeedsConfirmation {
        schema: Vec<SchemaColumn>,
    },
}

/// Validate `dataset_url` against the engine and the preset catalog.
///
/// Trusted sources succeed immediately with the standard-bbox assumption.
/// Otherwise the schema is described, a standard `bbox` struct column is
/// preferred, and the file metadata covering is consulted second. A source
/// with neither yields [`ValidationOutcome::NeedsConfirmation`] exactly
/// once.
///
/// # Errors
///
/// Returns [`crate::error::DownloadError::SourceUnreadable`] when the
/// dataset cannot be described.
pub fn validate(
    engine: &mut dyn SqlEngine,
    dataset_url: &str,
    catalog: &Catalog,
    events: &EventSender,
) -> Result<ValidationOutcome> {
    events.progress("Connecting to data source...");

    if !catalog.needs_validation(dataset_url) {
        return Ok(ValidationOutcome::Ready(ValidationReport::trusted()));
    }

    events.progress("Checking data format...");
    let schema = schema::describe(engine, dataset_url)?;

    // Standard bbox column first; metadata covering second.
    if let Some(column) = schema.iter().find(|c| c.is_bbox_struct()) {
        let name = column.name.clone();
        return Ok(ValidationOutcome::Ready(ValidationReport::with_bbox(
            schema, name,
        )));
    }

    events.progress("Checking for bbox metadata...");
    if let Some(column) = schema::find_bbox_covering(engine, dataset_url) {
        return Ok(ValidationOutcome::Ready(ValidationReport::with_bbox(
            schema, column,
        )));
    }

    Ok(ValidationOutcome::NeedsConfirmation { schema })
}
