//! `gpq-core` is the download engine behind the gpq tools: it clips remote
//! GeoParquet datasets to a viewport extent through an embedded analytical
//! SQL engine and materializes the result in the caller's chosen format.
//!
//! This crate includes:
//! - **Query construction**: schema-driven projections, bbox range
//!   predicates with a geometry-intersection fallback, and the staging
//!   extraction statement ([`query`], [`schema`]).
//! - **Source validation**: catalog trust checks, bbox covering detection
//!   from columns or file metadata ([`validate`], [`catalog`], [`metadata`]).
//! - **Jobs**: the download state machine, size estimation for text
//!   output, and the sequential queue ([`job`], [`estimate`], [`sequencer`]).
//!
//! The analytical engine is an injected capability (see [`engine`]); a
//! DuckDB-backed implementation is available behind the `duckdb` feature.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod events;
pub mod extent;
pub mod formats;
pub mod job;
pub mod metadata;
pub mod query;
pub mod schema;
pub mod sequencer;
pub mod validate;

pub use error::{DownloadError, Result};
pub use events::{EventSender, JobEvent};
pub use extent::{Crs, Extent};
pub use formats::OutputFormat;
pub use job::{DownloadJob, DownloadRequest, JobOutcome, KillSwitch};
pub use sequencer::{DownloadSequencer, SequencerState, SizeWarningChoice};
pub use validate::{ValidationOutcome, ValidationReport};
