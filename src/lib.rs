//! B3 Refiner Library
//!
//! Refines the daily snapshots of the B3 index composition, written to the
//! raw zone by an upstream scraper, into an analytics-ready dataset.
//!
//! This library provides tools for:
//! - Discovering date-partitioned raw snapshots and selecting the latest
//! - Renaming the scraper's columns and parsing locale-formatted numbers
//! - Annotating rows with the reference date and the gap to the previous snapshot
//! - Aggregating theoretical quantities and participation per company
//! - Writing the enriched table as a Hive-partitioned parquet dataset

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{CastPolicy, PipelineConfig, WriteMode};
pub use error::{RefineError, Result};
pub use models::{PartitionKey, ProcessingStats, SnapshotScalars};
pub use processor::SnapshotPipeline;
