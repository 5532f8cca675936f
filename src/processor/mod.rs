//! Snapshot refinement pipeline.
//!
//! Runs the stages strictly in order, each one feeding the next:
//! discover -> read latest -> normalize -> annotate date -> annotate diff ->
//! aggregate -> write. Any failure aborts the run; nothing is resumed.

pub mod aggregator;
pub mod catalog;
pub mod normalizer;
pub mod reader;
pub mod temporal;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{
    aggregator::Aggregator, catalog::PartitionCatalog, normalizer::SchemaNormalizer,
    reader::SnapshotReader, temporal::TemporalAnnotator, writer::PartitionWriter,
};

use crate::config::PipelineConfig;
use crate::constants::ACAO;
use crate::error::{RefineError, Result};
use crate::models::{PartitionKey, ProcessingStats, SnapshotScalars};

use polars::prelude::{DataFrame, PolarsError};
use std::time::Instant;
use tokio::task::{self, JoinError};
use tracing::{error, info};

/// End-to-end refinement of the most recent raw snapshot
#[derive(Debug)]
pub struct SnapshotPipeline {
    config: PipelineConfig,
    catalog: PartitionCatalog,
    reader: SnapshotReader,
    normalizer: SchemaNormalizer,
    aggregator: Aggregator,
    writer: PartitionWriter,
}

impl SnapshotPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let raw_location = config.raw_location();
        Ok(Self {
            catalog: PartitionCatalog::new(raw_location.clone(), config.date_format.clone()),
            reader: SnapshotReader::new(raw_location, config.read_concurrency),
            normalizer: SchemaNormalizer::new(config.cast_policy),
            aggregator: Aggregator::new(),
            writer: PartitionWriter::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discovery only: the available partitions, most recent first
    pub async fn partitions(&self) -> Result<Vec<PartitionKey>> {
        self.catalog
            .list_partitions()
            .await
            .inspect_err(|e| error!(stage = "discover", "Partition discovery failed: {}", e))
    }

    /// Run every stage for the most recent partition
    pub async fn run(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();

        let partitions = self.partitions().await?;
        let (latest, previous) = match partitions.as_slice() {
            [latest, previous, ..] => (latest, Some(previous)),
            [latest] => (latest, None),
            [] => {
                return Err(RefineError::NoPartitions {
                    location: self.catalog.location().to_path_buf(),
                });
            }
        };
        info!("Processing partition {}", latest);

        let snapshot = self
            .reader
            .read(latest)
            .await
            .inspect_err(|e| error!(stage = "read", "Reading {} failed: {}", latest, e))?;

        let normalized = self
            .normalizer
            .normalize(snapshot.frame)
            .inspect_err(|e| error!(stage = "normalize", "Normalization failed: {}", e))?;

        let scalars = SnapshotScalars::new(latest.date, previous.map(|p| p.date))
            .inspect_err(|e| error!(stage = "annotate", "Temporal annotation failed: {}", e))?;
        let annotator = TemporalAnnotator::new(scalars);
        let annotated = annotator.diff(annotator.annotate(normalized.frame));

        let aggregation = self
            .aggregator
            .aggregate(annotated)
            .inspect_err(|e| error!(stage = "aggregate", "Aggregation failed: {}", e))?;

        let enriched = collect(aggregation.frame)
            .await
            .inspect_err(|e| error!(stage = "aggregate", "Materialization failed: {}", e))?;

        if enriched.height() != snapshot.rows {
            let e = RefineError::RowCountMismatch {
                expected: snapshot.rows,
                found: enriched.height(),
            };
            error!(stage = "aggregate", "{}", e);
            return Err(e);
        }

        let distinct_groups = enriched.column(ACAO)?.n_unique()?;

        let mut stats = ProcessingStats {
            partitions_found: partitions.len(),
            reference_date: Some(scalars.reference_date),
            previous_date: scalars.previous_date,
            days_since_previous: scalars.days_since_previous,
            rows_read: snapshot.rows,
            distinct_groups,
            values_nulled: normalized.values_nulled,
            output_path: self.config.output_path.clone(),
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        if self.config.dry_run {
            info!(
                "Dry run: skipping write of {} rows to {}",
                enriched.height(),
                self.config.output_path.display()
            );
        } else {
            let writer = self.writer.clone();
            let summary = task::spawn_blocking(move || writer.write(&enriched))
                .await
                .map_err(|e| RefineError::write(&self.config.output_path, e))?
                .inspect_err(|e| error!(stage = "write", "Write failed: {}", e))?;

            stats.rows_written = summary.rows_written;
            stats.partitions_written = summary.partitions_written;
            stats.files_written = summary.files.len();
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!("ETL completed successfully in {}ms", stats.processing_time_ms);

        Ok(stats)
    }
}

/// Materialize a lazy frame off the async runtime
async fn collect(frame: polars::prelude::LazyFrame) -> Result<DataFrame> {
    Ok(task::spawn_blocking(move || frame.collect())
        .await
        .map_err(collect_task_failed)??)
}

/// A collect task that panicked or was cancelled is a compute failure
fn collect_task_failed(e: JoinError) -> RefineError {
    RefineError::Polars(PolarsError::ComputeError(
        format!("collect task failed: {}", e).into(),
    ))
}
