//! Integration tests for the processor module
//!
//! Exercise the complete pipeline against raw partitions written to a
//! temporary storage root.

pub mod end_to_end;

use crate::config::PipelineConfig;
use crate::constants::*;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// One scraped line: (Código, Ação, Tipo, Qtde. Teórica, Part. (%))
pub type RawLine<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

pub const PREFIX: &str = "raw/b3_data";

/// Scenario rows shared by several tests
pub const PETR_VALE: &[RawLine<'static>] = &[
    ("PETR4", "Petrobras", "ON", "1.000", "5,00"),
    ("VALE3", "Vale", "ON", "2.000", "10,00"),
];

/// Write one raw partition the way the scraper lays it out
pub fn write_raw_partition(bucket: &Path, date: &str, rows: &[RawLine]) -> PathBuf {
    let dir = bucket.join(PREFIX).join(format!("ano_mes_dia={}", date));
    fs::create_dir_all(&dir).unwrap();

    let mut df = df!(
        SOURCE_CODIGO => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        SOURCE_ACAO => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        SOURCE_TIPO => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        SOURCE_QUANTIDADE_TEORICA => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        SOURCE_PARTICIPACAO => rows.iter().map(|r| r.4).collect::<Vec<_>>()
    )
    .unwrap();

    let path = dir.join("part-0.parquet");
    ParquetWriter::new(File::create(&path).unwrap())
        .finish(&mut df)
        .unwrap();
    path
}

pub fn test_config(temp_dir: &TempDir) -> PipelineConfig {
    PipelineConfig::default()
        .with_raw_bucket(temp_dir.path())
        .with_raw_prefix(PREFIX)
        .with_output_path(temp_dir.path().join("refined"))
        .with_read_concurrency(2)
}

/// Parquet files under `root`, relative to it and sorted
pub fn output_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Read one written partition file
pub fn read_output(root: &Path, relative: &Path) -> DataFrame {
    ParquetReader::new(File::open(root.join(relative)).unwrap())
        .finish()
        .unwrap()
}

pub fn i64_column(df: &DataFrame, name: &str) -> Vec<i64> {
    df.column(name)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}
