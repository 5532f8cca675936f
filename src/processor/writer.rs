//! Partitioned parquet output
//!
//! Splits the enriched table by the configured partition columns and writes
//! one parquet file per partition under Hive-style directories:
//! ```text
//! output_path/
//!   data_referencia=2024-01-10/
//!     acao=PETROBRAS/part-00000.parquet
//!     acao=VALE/part-00000.parquet
//! ```
//! Partition columns live in the directory names only. There is no
//! all-or-nothing guarantee: a failure midway leaves the partitions written
//! so far in place.

use crate::config::{PipelineConfig, WriteMode};
use crate::constants::{HIVE_DEFAULT_PARTITION, PARQUET_EXTENSION};
use crate::error::{RefineError, Result};
use crate::models::WriteSummary;

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::{
    DataFrame, DataType, IntoLazy, ParquetCompression, ParquetWriter, StatisticsOptions, col,
};
use regex::{Captures, Regex};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Characters that cannot appear verbatim in a partition directory name
static UNSAFE_PATH_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\x00-\x1F\x7F/\\:=%?*"<>|#]"#).expect("valid partition escape pattern")
});

/// Prefix of the string-rendered partition key columns used while splitting
const KEY_COLUMN_PREFIX: &str = "__partition_key_";

/// Writer for the enriched table
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    output_path: PathBuf,
    partition_keys: Vec<String>,
    write_mode: WriteMode,
    compression: ParquetCompression,
    statistics: StatisticsOptions,
    show_progress: bool,
}

impl PartitionWriter {
    pub fn new(output_path: PathBuf, partition_keys: Vec<String>) -> Self {
        Self {
            output_path,
            partition_keys,
            write_mode: WriteMode::Overwrite,
            compression: ParquetCompression::Snappy,
            statistics: StatisticsOptions::full(),
            show_progress: false,
        }
    }

    /// Create a writer from the pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            output_path: config.output_path.clone(),
            partition_keys: config.partition_keys.clone(),
            write_mode: config.write_mode,
            compression: config.compression.to_polars_compression(),
            statistics: if config.enable_statistics {
                StatisticsOptions::full()
            } else {
                StatisticsOptions::empty()
            },
            show_progress: config.show_progress,
        }
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Write `df` partitioned by the configured columns, in their given order
    pub fn write(&self, df: &DataFrame) -> Result<WriteSummary> {
        if df.height() == 0 {
            warn!("Nothing to write: enriched table is empty");
            return Ok(WriteSummary::default());
        }

        let key_columns: Vec<String> = self
            .partition_keys
            .iter()
            .map(|key| format!("{}{}", KEY_COLUMN_PREFIX, key))
            .collect();

        // Render key values as strings once, so dates come out as ISO dates
        let keyed = df
            .clone()
            .lazy()
            .with_columns(
                self.partition_keys
                    .iter()
                    .zip(&key_columns)
                    .map(|(key, key_column)| col(key.as_str()).cast(DataType::String).alias(key_column.as_str()))
                    .collect::<Vec<_>>(),
            )
            .collect()
            .map_err(|e| RefineError::write(&self.output_path, e))?;

        let parts = keyed
            .partition_by_stable(key_columns.iter().map(String::as_str), true)
            .map_err(|e| RefineError::write(&self.output_path, e))?;

        debug!(
            "Writing {} partitions under {}",
            parts.len(),
            self.output_path.display()
        );

        let progress_bar = self.progress_bar(parts.len());
        let stamp = self.file_stamp();
        let dropped: Vec<&str> = key_columns
            .iter()
            .chain(&self.partition_keys)
            .map(String::as_str)
            .collect();

        let mut summary = WriteSummary::default();
        for part in parts {
            let partition_dir = self.partition_dir(&part, &key_columns)?;
            progress_bar.set_message(partition_dir.display().to_string());

            let mut data = part.drop_many(dropped.iter().copied());
            let path = self.write_file(&partition_dir, stamp.as_deref(), &mut data)?;

            summary.rows_written += data.height();
            summary.partitions_written += 1;
            summary.files.push(path);
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        info!(
            "Data saved to {} ({} rows, {} partitions)",
            self.output_path.display(),
            summary.rows_written,
            summary.partitions_written
        );

        Ok(summary)
    }

    /// Directory of one partition, built from its first row's key values
    fn partition_dir(&self, part: &DataFrame, key_columns: &[String]) -> Result<PathBuf> {
        let mut dir = self.output_path.clone();
        for (key, key_column) in self.partition_keys.iter().zip(key_columns) {
            let values = part
                .column(key_column)
                .and_then(|c| c.str().cloned())
                .map_err(|e| RefineError::write(&self.output_path, e))?;
            dir.push(format!("{}={}", key, escape_partition_value(values.get(0))));
        }
        Ok(dir)
    }

    fn write_file(
        &self,
        partition_dir: &Path,
        stamp: Option<&str>,
        data: &mut DataFrame,
    ) -> Result<PathBuf> {
        if self.write_mode == WriteMode::Overwrite && partition_dir.exists() {
            debug!("Replacing existing partition {}", partition_dir.display());
            fs::remove_dir_all(partition_dir).map_err(|e| RefineError::write(partition_dir, e))?;
        }
        fs::create_dir_all(partition_dir).map_err(|e| RefineError::write(partition_dir, e))?;

        let (path, file) = create_data_file(partition_dir, stamp)?;
        ParquetWriter::new(file)
            .with_compression(self.compression)
            .with_statistics(self.statistics)
            .finish(data)
            .map_err(|e| RefineError::write(&path, e))?;

        debug!("Wrote {} rows to {}", data.height(), path.display());
        Ok(path)
    }

    /// Millisecond stamp shared by the files of one append run
    fn file_stamp(&self) -> Option<String> {
        match self.write_mode {
            WriteMode::Overwrite => None,
            WriteMode::Append => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or_default();
                Some(millis.to_string())
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        progress_bar
    }
}

/// Create the next data file of a partition directory
///
/// Without a stamp the directory was just emptied and the name is fixed. With
/// one, the sequence number is bumped until the name is free, so existing
/// files are never truncated.
fn create_data_file(partition_dir: &Path, stamp: Option<&str>) -> Result<(PathBuf, File)> {
    let Some(stamp) = stamp else {
        let path = partition_dir.join(format!("part-00000.{}", PARQUET_EXTENSION));
        let file = File::create(&path).map_err(|e| RefineError::write(&path, e))?;
        return Ok((path, file));
    };

    let mut seq = 0u32;
    loop {
        let path = partition_dir.join(format!("part-{}-{:05}.{}", stamp, seq, PARQUET_EXTENSION));
        match File::create_new(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} exists, trying the next sequence number", path.display());
                seq += 1;
            }
            Err(e) => return Err(RefineError::write(&path, e)),
        }
    }
}

/// Render a partition value as a directory-safe string
///
/// Unsafe characters are percent-encoded; a null value maps to the Hive
/// default partition name.
pub fn escape_partition_value(value: Option<&str>) -> String {
    match value {
        None => HIVE_DEFAULT_PARTITION.to_string(),
        Some("") => HIVE_DEFAULT_PARTITION.to_string(),
        Some(value) => UNSAFE_PATH_CHARS
            .replace_all(value, |caps: &Captures| {
                caps[0]
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect::<String>()
            })
            .into_owned(),
    }
}
