//! Raw snapshot reading
//!
//! Materializes the parquet files of one raw partition and hands them on as
//! a single lazy table. Failures are reported as-is; retries belong to the
//! storage layer.

use crate::error::{RefineError, Result};
use crate::models::PartitionKey;
use crate::constants::PARQUET_EXTENSION;

use futures::stream::{self, StreamExt, TryStreamExt};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, info};

/// A raw snapshot loaded from storage
pub struct RawSnapshot {
    pub frame: LazyFrame,
    pub rows: usize,
    pub files: Vec<PathBuf>,
}

/// Reader for the partitions of one raw location
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    location: PathBuf,
    concurrency: usize,
}

impl SnapshotReader {
    pub fn new(location: PathBuf, concurrency: usize) -> Self {
        Self {
            location,
            concurrency: concurrency.max(1),
        }
    }

    /// Storage path of a partition
    pub fn partition_path(&self, partition: &PartitionKey) -> PathBuf {
        self.location.join(&partition.segment)
    }

    /// Read every parquet file of `partition` into one table
    pub async fn read(&self, partition: &PartitionKey) -> Result<RawSnapshot> {
        let partition_path = self.partition_path(partition);
        let files = list_parquet_files(&partition_path)?;

        if files.is_empty() {
            return Err(RefineError::read(
                &partition_path,
                "partition holds no parquet files",
            ));
        }

        debug!(
            "Reading {} files from {}",
            files.len(),
            partition_path.display()
        );

        // `buffered` keeps file order, so row order is stable across runs
        let frames: Vec<DataFrame> = stream::iter(files.clone())
            .map(|path| async move {
                let path_for_task = path.clone();
                task::spawn_blocking(move || read_parquet_file(&path_for_task))
                    .await
                    .map_err(|e| RefineError::read(&path, format!("read task failed: {}", e)))?
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let rows = frames.iter().map(DataFrame::height).sum();
        let lazy_frames: Vec<LazyFrame> = frames.into_iter().map(DataFrame::lazy).collect();

        let frame = if lazy_frames.len() == 1 {
            lazy_frames.into_iter().next().ok_or_else(|| {
                RefineError::read(&partition_path, "partition holds no parquet files")
            })?
        } else {
            concat(lazy_frames, UnionArgs::default())
                .map_err(|e| RefineError::read(&partition_path, e))?
        };

        info!("Read {} rows from partition {}", rows, partition);

        Ok(RawSnapshot {
            frame,
            rows,
            files,
        })
    }
}

/// Parquet files directly inside a partition directory, sorted by path
fn list_parquet_files(partition_path: &Path) -> Result<Vec<PathBuf>> {
    let pattern = partition_path.join(format!("*.{}", PARQUET_EXTENSION));
    let pattern = pattern.to_string_lossy();

    let paths = glob::glob(&pattern).map_err(|e| RefineError::read(partition_path, e))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| RefineError::read(partition_path, e))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

fn read_parquet_file(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| RefineError::read(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| RefineError::read(path, e))
}
