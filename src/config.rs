//! Configuration management and validation.
//!
//! A run is driven by a single immutable [`PipelineConfig`] value. It can be
//! loaded from TOML, adjusted through the `with_*` builders, and is validated
//! before any stage sees it.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_DATE_FORMAT, DEFAULT_OUTPUT_PATH,
    DEFAULT_PARTITION_KEYS, DEFAULT_RAW_BUCKET, DEFAULT_RAW_PREFIX, OUTPUT_COLUMNS,
};
use crate::error::{RefineError, Result};
use chrono::format::{Item, StrftimeItems};
use clap::ValueEnum;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What to do with numeric text that does not parse after separator
/// normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CastPolicy {
    /// Fail the whole run on the first malformed value
    #[default]
    Strict,
    /// Replace the malformed value with null, keep the row and continue
    NullOnError,
}

/// How the writer treats a partition directory that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the contents of every partition directory this run writes to
    #[default]
    Overwrite,
    /// Add a new file next to whatever the partition already holds
    Append,
}

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    #[default]
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Configuration for one refinement job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the raw storage location (bucket root or a mount of it)
    pub raw_bucket: PathBuf,

    /// Prefix under the bucket holding `<field>=<date>` partitions
    pub raw_prefix: String,

    /// Destination of the partitioned, enriched table
    pub output_path: PathBuf,

    /// Output partition columns, outermost first
    pub partition_keys: Vec<String>,

    /// strftime format of the date in raw partition segments
    pub date_format: String,

    /// Policy for malformed numeric text
    pub cast_policy: CastPolicy,

    /// Overwrite or append to existing output partitions
    pub write_mode: WriteMode,

    /// Compression algorithm for output files
    pub compression: CompressionAlgorithm,

    /// Enable column statistics for query pruning
    pub enable_statistics: bool,

    /// Maximum number of raw files read concurrently
    pub read_concurrency: usize,

    /// Run every stage except the final write
    pub dry_run: bool,

    /// Show a progress bar while writing partitions
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_bucket: PathBuf::from(DEFAULT_RAW_BUCKET),
            raw_prefix: DEFAULT_RAW_PREFIX.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            partition_keys: DEFAULT_PARTITION_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            cast_policy: CastPolicy::default(),
            write_mode: WriteMode::default(),
            compression: CompressionAlgorithm::default(),
            enable_statistics: true,
            read_concurrency: num_cpus::get().max(1),
            dry_run: false,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| RefineError::configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RefineError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Default config file location, e.g. `~/.config/b3-refiner/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit file, else from the default location if it
    /// exists, else fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path),
                None => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Directory listing the raw partitions
    pub fn raw_location(&self) -> PathBuf {
        self.raw_bucket.join(&self.raw_prefix)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.partition_keys.is_empty() {
            return Err(RefineError::configuration(
                "partition_keys must name at least one column",
            ));
        }

        let mut seen = HashSet::new();
        for key in &self.partition_keys {
            if !OUTPUT_COLUMNS.contains(&key.as_str()) {
                return Err(RefineError::configuration(format!(
                    "partition key '{}' is not an output column (expected one of: {})",
                    key,
                    OUTPUT_COLUMNS.join(", ")
                )));
            }
            if !seen.insert(key.as_str()) {
                return Err(RefineError::configuration(format!(
                    "partition key '{}' is listed more than once",
                    key
                )));
            }
        }

        if self.date_format.trim().is_empty()
            || StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error))
        {
            return Err(RefineError::configuration(format!(
                "invalid date_format '{}'",
                self.date_format
            )));
        }

        if self.read_concurrency == 0 {
            return Err(RefineError::configuration(
                "read_concurrency must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn with_raw_bucket(mut self, raw_bucket: impl Into<PathBuf>) -> Self {
        self.raw_bucket = raw_bucket.into();
        self
    }

    pub fn with_raw_prefix(mut self, raw_prefix: impl Into<String>) -> Self {
        self.raw_prefix = raw_prefix.into();
        self
    }

    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    pub fn with_partition_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    pub fn with_cast_policy(mut self, cast_policy: CastPolicy) -> Self {
        self.cast_policy = cast_policy;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_read_concurrency(mut self, read_concurrency: usize) -> Self {
        self.read_concurrency = read_concurrency;
        self
    }

    /// Enable dry-run mode (no output is written)
    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}
