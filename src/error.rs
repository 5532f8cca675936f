//! Error handling for snapshot refinement.
//!
//! Every stage of the pipeline maps its failures onto one of these kinds and
//! propagates them unchanged; nothing in the core retries.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("No partitions found at: {location}")]
    NoPartitions { location: PathBuf },

    #[error("Malformed partition segment '{segment}': {reason}")]
    MalformedPartition { segment: String, reason: String },

    #[error("Failed to read partition at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Raw snapshot is missing source columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error(
        "Could not parse {rows} value(s) of column '{column}' (e.g. {})",
        samples.join(", ")
    )]
    Cast {
        column: String,
        rows: usize,
        samples: Vec<String>,
    },

    #[error("{rows} row(s) have no grouping key")]
    Grouping { rows: usize },

    #[error("Failed to write partition at {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Previous reference date {previous} is after current reference date {current}")]
    TemporalOrder {
        current: NaiveDate,
        previous: NaiveDate,
    },

    #[error("Row count changed during processing: expected {expected}, found {found}")]
    RowCountMismatch { expected: usize, found: usize },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl RefineError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a read error for a partition path
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a write error for an output path
    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RefineError>;
