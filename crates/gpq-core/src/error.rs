//! Custom error types for download and validation operations.
//!
//! This module provides structured error handling using `thiserror`. Only
//! conditions the caller must treat as failures live here: an empty result,
//! a size-threshold interruption, a cancelled job, and an unparseable "geo"
//! metadata document are all reported through other channels (informational
//! events, a suspension, silence, and a degraded lookup respectively).

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

/// Main error type for download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The dataset's schema could not be described (bad URL, network
    /// failure, corrupt file, missing permissions).
    #[error("Error validating source '{url}': {message}")]
    SourceUnreadable {
        /// The dataset URL that failed to describe
        url: String,
        /// The engine's error message, verbatim
        message: String,
    },

    /// The destination extension is not one the materialization step knows.
    #[error("Unsupported file format: '{path}'")]
    UnsupportedFormat {
        /// The offending destination path
        path: PathBuf,
    },

    /// The requested extent could not be expressed in EPSG:4326.
    #[error("Cannot transform the requested extent from '{crs}' to EPSG:4326")]
    UnsupportedCrs {
        /// The source coordinate reference system identifier
        crs: String,
    },

    /// An engine failure during extraction or materialization, reclassified
    /// at the job boundary.
    #[error("Query failed: {0}")]
    Engine(#[from] EngineError),

    /// A dataset URL with a scheme the downloader does not accept.
    #[error("Invalid dataset URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Type alias for Results using [`DownloadError`].
pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Get a user-facing error message.
    ///
    /// Engine-level detail is preserved verbatim; the caller never sees a raw
    /// engine error type, only this reclassified text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SourceUnreadable { .. }
            | Self::UnsupportedCrs { .. }
            | Self::InvalidUrl { .. } => self.to_string(),
            Self::UnsupportedFormat { .. } => "Unsupported file format.".to_string(),
            Self::Engine(e) => e.to_string(),
        }
    }
}
