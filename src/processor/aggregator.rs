//! Cross-sectional aggregation
//!
//! Computes the whole-snapshot quantity total and the per-`acao` sums, then
//! joins them back onto every row.
//!
//! The per-group frame carries only the grouping key and the two group sums,
//! so the join has no overlapping value columns: every output column has a
//! single source (row columns from the snapshot, `*_acao` from the group
//! frame, the total from the broadcast scalar).

use crate::constants::{
    ACAO, CODIGO, OUTPUT_COLUMNS, PARTICIPACAO_PERCENTUAL, PARTICIPACAO_PERCENTUAL_ACAO,
    QUANTIDADE_TEORICA, QUANTIDADE_TEORICA_ACAO, QUANTIDADE_TEORICA_TOTAL,
};
use crate::error::{RefineError, Result};

use polars::prelude::*;
use tracing::info;

/// Result of aggregating a snapshot
pub struct Aggregation {
    pub frame: LazyFrame,
    /// Sum of `quantidade_teorica` over the whole snapshot
    pub quantidade_teorica_total: i64,
}

/// Per-group and global aggregates over one snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Enrich every row with the snapshot total and its group's sums
    ///
    /// Rows are neither dropped nor duplicated. A row without `acao` cannot
    /// be grouped and fails the run.
    pub fn aggregate(&self, frame: LazyFrame) -> Result<Aggregation> {
        let ungrouped = frame
            .clone()
            .filter(col(ACAO).is_null())
            .select([len()])
            .collect()?;
        let ungrouped_rows = ungrouped.column("len")?.get(0)?.try_extract::<usize>()?;
        if ungrouped_rows > 0 {
            return Err(RefineError::Grouping {
                rows: ungrouped_rows,
            });
        }

        let quantidade_teorica_total = scalar_total(&frame)?;

        let groups = frame.clone().group_by([col(ACAO)]).agg([
            col(QUANTIDADE_TEORICA).sum().alias(QUANTIDADE_TEORICA_ACAO),
            col(PARTICIPACAO_PERCENTUAL)
                .sum()
                .alias(PARTICIPACAO_PERCENTUAL_ACAO),
        ]);

        let enriched = frame
            .with_column(
                lit(quantidade_teorica_total)
                    .cast(DataType::Int64)
                    .alias(QUANTIDADE_TEORICA_TOTAL),
            )
            .join(
                groups,
                [col(ACAO)],
                [col(ACAO)],
                JoinArgs::new(JoinType::Inner),
            )
            .select(OUTPUT_COLUMNS.iter().map(|name| col(*name)).collect::<Vec<_>>())
            .sort_by_exprs([col(ACAO), col(CODIGO)], SortMultipleOptions::default());

        info!(
            "Data aggregated (quantidade_teorica_total = {})",
            quantidade_teorica_total
        );

        Ok(Aggregation {
            frame: enriched,
            quantidade_teorica_total,
        })
    }
}

fn scalar_total(frame: &LazyFrame) -> Result<i64> {
    let total = frame
        .clone()
        .select([col(QUANTIDADE_TEORICA).sum()])
        .collect()?;

    let value = total.column(QUANTIDADE_TEORICA)?.get(0)?;
    if value.is_null() {
        return Ok(0);
    }
    Ok(value.try_extract::<i64>()?)
}
