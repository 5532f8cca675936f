//! Temporal annotation
//!
//! Attaches the snapshot's reference date and its distance in days from the
//! snapshot before it. Both are snapshot-level scalars broadcast onto every
//! row.

use crate::constants::{DATA_REFERENCIA, DIAS_ULTIMA_DATA_REFERENCIA};
use crate::models::SnapshotScalars;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::info;

/// Adds the temporal columns to a snapshot
#[derive(Debug, Clone, Copy)]
pub struct TemporalAnnotator {
    scalars: SnapshotScalars,
}

impl TemporalAnnotator {
    pub fn new(scalars: SnapshotScalars) -> Self {
        Self { scalars }
    }

    pub fn scalars(&self) -> &SnapshotScalars {
        &self.scalars
    }

    /// Add `data_referencia` as a constant date column
    pub fn annotate(&self, frame: LazyFrame) -> LazyFrame {
        info!(
            "Reference date added: {}",
            self.scalars.reference_date
        );
        frame.with_column(date_literal(self.scalars.reference_date).alias(DATA_REFERENCIA))
    }

    /// Add `quantidade_dias_ultima_data_referencia`: 0 for the first
    /// snapshot, otherwise the days elapsed since the previous one
    pub fn diff(&self, frame: LazyFrame) -> LazyFrame {
        match self.scalars.previous_date {
            Some(previous) => info!(
                "Days since previous reference date ({}): {}",
                previous, self.scalars.days_since_previous
            ),
            None => info!("No previous reference date, days difference set to 0"),
        }
        frame.with_column(
            lit(self.scalars.days_since_previous)
                .cast(DataType::Int64)
                .alias(DIAS_ULTIMA_DATA_REFERENCIA),
        )
    }
}

/// Days from 0001-01-01 (day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since the Unix epoch, the physical representation of a date column
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Date literal, as days since the Unix epoch cast to the date type
pub fn date_literal(date: NaiveDate) -> Expr {
    lit(epoch_days(date)).cast(DataType::Date)
}
