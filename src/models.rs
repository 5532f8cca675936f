//! Core data structures for snapshot refinement.
//!
//! Partition keys, the snapshot-level scalars shared by every row of a run,
//! and the statistics reported once a run completes.

use crate::error::{RefineError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// A raw partition, addressed by the `<field>=<date>` segment of its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionKey {
    /// Directory name as found in storage, e.g. `ano_mes_dia=2024-01-10`
    pub segment: String,
    /// Partition field name, e.g. `ano_mes_dia`
    pub field: String,
    /// Reference date encoded by the segment
    pub date: NaiveDate,
}

impl PartitionKey {
    /// Parse a `<field>=<date>` segment using the given strftime format
    pub fn parse(segment: &str, date_format: &str) -> Result<Self> {
        let malformed = |reason: String| RefineError::MalformedPartition {
            segment: segment.to_string(),
            reason,
        };

        let mut parts = segment.split('=');
        let (field, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(field), Some(value), None) => (field.trim(), value.trim()),
            _ => {
                return Err(malformed(
                    "expected exactly one '=' separating field and date".to_string(),
                ));
            }
        };

        if field.is_empty() {
            return Err(malformed("empty partition field name".to_string()));
        }

        let date = NaiveDate::parse_from_str(value, date_format)
            .map_err(|e| malformed(format!("'{}' does not match '{}': {}", value, date_format, e)))?;

        Ok(Self {
            segment: segment.to_string(),
            field: field.to_string(),
            date,
        })
    }
}

impl Ord for PartitionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.segment.cmp(&other.segment))
    }
}

impl PartialOrd for PartitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment)
    }
}

/// Values that hold for the whole snapshot rather than for individual rows.
///
/// They are computed once per run and broadcast onto every row, so no stage
/// ever derives them from row contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotScalars {
    pub reference_date: NaiveDate,
    pub previous_date: Option<NaiveDate>,
    pub days_since_previous: i64,
}

impl SnapshotScalars {
    /// Build the scalars for `current`, measured against the snapshot before it
    pub fn new(current: NaiveDate, previous: Option<NaiveDate>) -> Result<Self> {
        let days_since_previous = match previous {
            None => 0,
            Some(previous) if previous > current => {
                return Err(RefineError::TemporalOrder { current, previous });
            }
            Some(previous) => (current - previous).num_days(),
        };

        Ok(Self {
            reference_date: current,
            previous_date: previous,
            days_since_previous,
        })
    }
}

/// Outcome of persisting one enriched table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub partitions_written: usize,
    pub files: Vec<PathBuf>,
}

/// Processing statistics for one pipeline run
#[derive(Debug, Default, Serialize)]
pub struct ProcessingStats {
    pub partitions_found: usize,
    pub reference_date: Option<NaiveDate>,
    pub previous_date: Option<NaiveDate>,
    pub days_since_previous: i64,
    pub rows_read: usize,
    pub rows_written: usize,
    pub distinct_groups: usize,
    pub partitions_written: usize,
    pub files_written: usize,
    pub values_nulled: usize,
    pub output_path: PathBuf,
    pub dry_run: bool,
    pub processing_time_ms: u128,
}
