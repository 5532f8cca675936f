//! Partition discovery for raw snapshots
//!
//! Lists the `<field>=<date>` directories under the raw location and orders
//! them so that the most recent snapshot comes first.

use crate::error::{RefineError, Result};
use crate::models::PartitionKey;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Catalog of the raw partitions available at one storage location
#[derive(Debug, Clone)]
pub struct PartitionCatalog {
    location: PathBuf,
    date_format: String,
}

impl PartitionCatalog {
    /// Create a catalog over `location` (bucket root joined with the raw prefix)
    pub fn new(location: PathBuf, date_format: impl Into<String>) -> Self {
        Self {
            location,
            date_format: date_format.into(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// List the available partitions, most recent first
    ///
    /// Raw data follows this structure:
    /// ```text
    /// raw_prefix/
    ///   ano_mes_dia=2024-01-08/
    ///     part-0.parquet
    ///   ano_mes_dia=2024-01-10/
    ///     part-0.parquet
    /// ```
    /// Entries without `=` are not partitions and are skipped. A partition
    /// directory whose segment does not hold exactly one parseable date is
    /// an error, as is finding no partition at all.
    pub async fn list_partitions(&self) -> Result<Vec<PartitionKey>> {
        debug!("Listing partitions in: {}", self.location.display());

        let mut by_date = BTreeMap::new();

        match fs::read_dir(&self.location).await {
            Ok(mut dir) => {
                while let Some(entry) = dir.next_entry().await? {
                    if !entry.file_type().await?.is_dir() {
                        continue;
                    }

                    let name = entry.file_name();
                    let Some(segment) = name.to_str() else {
                        debug!("Skipping non UTF-8 entry: {:?}", name);
                        continue;
                    };
                    if !segment.contains('=') {
                        debug!("Skipping non-partition directory: {}", segment);
                        continue;
                    }

                    let key = PartitionKey::parse(segment, &self.date_format)?;
                    // Keep one key per date; lowest segment name wins for determinism
                    match by_date.entry(key.date) {
                        Entry::Vacant(slot) => {
                            slot.insert(key);
                        }
                        Entry::Occupied(mut slot) => {
                            if key.segment < slot.get().segment {
                                slot.insert(key);
                            }
                        }
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Raw location does not exist: {}", self.location.display());
            }
            Err(e) => return Err(e.into()),
        }

        if by_date.is_empty() {
            return Err(RefineError::NoPartitions {
                location: self.location.clone(),
            });
        }

        let partitions: Vec<PartitionKey> = by_date.into_values().rev().collect();
        info!(
            "Found {} partitions: {}",
            partitions.len(),
            partitions
                .iter()
                .map(|p| p.segment.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(partitions)
    }
}
