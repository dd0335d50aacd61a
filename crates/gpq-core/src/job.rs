//! The download worker.
//!
//! One job turns one [`DownloadRequest`] into a file: connect, load
//! extensions, describe the schema, build the extraction query, materialize
//! a staging table, inspect it, and write the destination. The job owns its
//! engine connection for its whole lifetime and reports through the event
//! channel. Cancellation is cooperative: the kill flag is checked at each
//! phase boundary, an in-flight engine call is never aborted, and a killed
//! job emits nothing further.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::engine::{EngineFactory, SqlEngine, Value};
use crate::error::{DownloadError, Result};
use crate::estimate::{SIZE_WARNING_THRESHOLD_MB, estimate_geojson_size_mb};
use crate::events::EventSender;
use crate::extent::{Crs, Extent, to_geographic};
use crate::formats::OutputFormat;
use crate::query::{STAGING_TABLE, build_extraction_query, build_predicate, build_projection};
use crate::schema;
use crate::validate::ValidationReport;

/// Everything needed to run one download. Created in a batch before any
/// download starts and consumed exactly once.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub dataset_url: String,
    pub extent: Extent,
    pub crs: Crs,
    pub output_path: PathBuf,
    pub validation: ValidationReport,
    /// Display label for progress text, e.g. "Overture Base - Water".
    pub label: Option<String>,
    /// Set when the user already accepted a large-GeoJSON warning for this
    /// request; suppresses the size check on resubmission.
    pub size_warning_accepted: bool,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(
        dataset_url: impl Into<String>,
        extent: Extent,
        crs: Crs,
        output_path: impl Into<PathBuf>,
        validation: ValidationReport,
    ) -> Self {
        Self {
            dataset_url: dataset_url.into(),
            extent,
            crs,
            output_path: output_path.into(),
            validation,
            label: None,
            size_warning_accepted: false,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The active phase finishes; no further phase
    /// starts and no further signals are emitted.
    pub fn kill(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so a queue can be resumed after a cancellation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Terminal state of one job run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOutcome {
    /// Finished, including the empty-result case (reported as info).
    Completed,
    /// Failed; the error event has already been emitted.
    Failed,
    /// Suspended on the size threshold; the request must be resubmitted or
    /// abandoned.
    SizeWarning(f64),
    /// The kill flag was observed; nothing further was emitted.
    Killed,
}

/// Executes one [`DownloadRequest`] against an engine connection.
pub struct DownloadJob {
    request: DownloadRequest,
    events: EventSender,
    kill: KillSwitch,
}

impl DownloadJob {
    #[must_use]
    pub fn new(request: DownloadRequest, events: EventSender, kill: KillSwitch) -> Self {
        Self {
            request,
            events,
            kill,
        }
    }

    #[must_use]
    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    /// Recover the request, e.g. to resubmit it after a size warning.
    #[must_use]
    pub fn into_request(self) -> DownloadRequest {
        self.request
    }

    /// Run the job to a terminal state.
    ///
    /// Failures are reclassified and emitted as an error event here; the
    /// caller only sees the outcome.
    pub fn run(&mut self, factory: &dyn EngineFactory) -> JobOutcome {
        match self.execute(factory) {
            Ok(outcome) => outcome,
            Err(e) => {
                if !self.kill.is_killed() {
                    self.events.error(e.user_message());
                }
                JobOutcome::Failed
            },
        }
    }

    fn execute(&mut self, factory: &dyn EngineFactory) -> Result<JobOutcome> {
        let suffix = self.label_suffix();
        let format = OutputFormat::from_path(&self.request.output_path);
        let database_destination = format.is_some_and(|f| f.is_database());

        self.progress(format!("Connecting to database{suffix}..."));
        let extent = to_geographic(Some(&self.request.extent), Some(&self.request.crs))
            .ok_or_else(|| DownloadError::UnsupportedCrs {
                crs: self.request.crs.as_str().to_string(),
            })?;

        let mut engine = if database_destination {
            factory.connect_at(&self.request.output_path)?
        } else {
            factory.connect()?
        };

        self.progress(format!("Loading spatial extension{suffix}..."));
        crate::engine::prepare_remote_access(engine.as_mut())?;

        let result = self.run_phases(engine.as_mut(), format, &extent, &suffix);

        if !database_destination {
            // Best-effort; the connection is dropped right after.
            let _ = engine.execute(&format!("DROP TABLE IF EXISTS {STAGING_TABLE}"));
        }
        result
    }

    fn run_phases(
        &mut self,
        engine: &mut dyn SqlEngine,
        format: Option<OutputFormat>,
        extent: &Extent,
        suffix: &str,
    ) -> Result<JobOutcome> {
        if self.kill.is_killed() {
            return Ok(JobOutcome::Killed);
        }

        let schema = schema::describe(engine, &self.request.dataset_url)?;
        self.request.validation.attach_schema(schema.clone());

        if self.kill.is_killed() {
            return Ok(JobOutcome::Killed);
        }

        self.progress(format!("Preparing query{suffix}..."));
        let projection = build_projection(&schema, format, &self.request.dataset_url);
        let predicate = build_predicate(extent, self.request.validation.bbox_column.as_deref());
        let extraction = build_extraction_query(
            &self.request.dataset_url,
            &projection,
            &predicate,
            STAGING_TABLE,
        );

        self.progress(format!("Downloading data{suffix}..."));
        debug!("Executing SQL query: {extraction}");
        if let Err(e) = engine.execute(&extraction) {
            if e.message.contains("No data found") {
                self.info(format!(
                    "No data found{suffix} in the requested area for {}. \
                     Skipping to next dataset if available.",
                    self.request.dataset_url
                ));
                self.completed();
                return Ok(JobOutcome::Completed);
            }
            return Err(DownloadError::Engine(e));
        }

        if self.kill.is_killed() {
            return Ok(JobOutcome::Killed);
        }

        let row_count = engine
            .query(&format!("SELECT COUNT(*) FROM {STAGING_TABLE}"))?
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if row_count == 0 {
            self.info(format!(
                "No data found{suffix} in the requested area. Check that your map extent \
                 overlaps with the data and/or expand your map extent. \
                 Skipping to next dataset if available."
            ));
            self.completed();
            return Ok(JobOutcome::Completed);
        }

        self.progress(format!("Processing data to requested format{suffix}..."));

        let Some(format) = format else {
            return Err(DownloadError::UnsupportedFormat {
                path: self.request.output_path.clone(),
            });
        };

        if format == OutputFormat::GeoJson && !self.request.size_warning_accepted {
            let estimated = estimate_geojson_size_mb(engine);
            if estimated > SIZE_WARNING_THRESHOLD_MB {
                if !self.kill.is_killed() {
                    self.events.file_size_warning(estimated);
                }
                return Ok(JobOutcome::SizeWarning(estimated));
            }
        }

        if let Some(options) = format.copy_options() {
            let copy = format!(
                "COPY {STAGING_TABLE} TO '{}' {options}",
                self.request.output_path.display()
            );
            debug!("Executing SQL query: {copy}");
            engine.execute(&copy)?;
        } else {
            // Database destination: the staging table already lives in the
            // output file, flush it.
            engine.execute("CHECKPOINT;")?;
        }

        if self.kill.is_killed() {
            return Ok(JobOutcome::Killed);
        }

        if format.is_database() {
            self.info(
                "Data has been successfully saved to the DuckDB database.\n\n\
                 Note: the host application may not support loading DuckDB files directly."
                    .to_string(),
            );
        } else {
            self.request_load(self.request.output_path.clone());
        }
        self.completed();
        Ok(JobOutcome::Completed)
    }

    fn label_suffix(&self) -> String {
        self.request
            .label
            .as_ref()
            .map(|label| format!(" for {label}"))
            .unwrap_or_default()
    }

    // Event emission is suppressed once the kill flag is set.

    fn progress(&self, message: String) {
        if !self.kill.is_killed() {
            self.events.progress(message);
        }
    }

    fn info(&self, message: String) {
        if !self.kill.is_killed() {
            self.events.info(message);
        }
    }

    fn request_load(&self, path: PathBuf) {
        if !self.kill.is_killed() {
            self.events.request_load(path);
        }
    }

    fn completed(&self) {
        if !self.kill.is_killed() {
            self.events.completed();
        }
    }
}
