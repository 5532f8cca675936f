//! Schema normalization for raw snapshots
//!
//! Renames the scraper's column headers to canonical names and parses the
//! locale-formatted numeric text: quantities use `.` as thousands separator
//! ("1.234.567") and percentages use `,` as decimal separator ("12,34").

use crate::config::CastPolicy;
use crate::constants::{
    CAST_ERROR_SAMPLES, DECIMAL_SEPARATOR, PARTICIPACAO_PERCENTUAL, PERCENTAGE_PATTERN,
    QUANTIDADE_TEORICA, QUANTITY_PATTERN, RENAME_MAP, THOUSANDS_SEPARATOR,
};
use crate::error::{RefineError, Result};

use polars::prelude::*;
use tracing::{debug, info, warn};

/// Outcome of casting a snapshot's numeric columns
pub struct CastOutcome {
    pub frame: LazyFrame,
    /// Values replaced by null under [`CastPolicy::NullOnError`]
    pub values_nulled: usize,
}

/// Canonicalizes raw snapshot columns
#[derive(Debug, Clone, Copy)]
pub struct SchemaNormalizer {
    policy: CastPolicy,
}

impl SchemaNormalizer {
    pub fn new(policy: CastPolicy) -> Self {
        Self { policy }
    }

    /// Rename the five source columns to their canonical names
    ///
    /// Columns outside the mapping pass through untouched. Every mapped
    /// source column must be present.
    pub fn rename(&self, mut frame: LazyFrame) -> Result<LazyFrame> {
        let schema = frame.collect_schema()?;

        let missing: Vec<String> = RENAME_MAP
            .iter()
            .filter(|(source, _)| !schema.contains(source))
            .map(|(source, _)| source.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RefineError::SchemaMismatch { missing });
        }

        let (existing, new): (Vec<&str>, Vec<&str>) = RENAME_MAP.iter().copied().unzip();
        info!("Renamed {} columns", existing.len());

        Ok(frame.rename(existing, new, true))
    }

    /// Parse the numeric text columns
    ///
    /// Under [`CastPolicy::Strict`] any value that does not parse fails the
    /// run. Under [`CastPolicy::NullOnError`] it becomes null and the row is
    /// kept. Missing text, signs and exponents on quantities, and `NaN`/`inf`
    /// spellings count as unparseable.
    pub fn cast(&self, frame: LazyFrame) -> Result<CastOutcome> {
        let mut values_nulled = 0;

        for column in [QUANTIDADE_TEORICA, PARTICIPACAO_PERCENTUAL] {
            let failures = frame
                .clone()
                .select([col(column)])
                .filter(parse_failed(column))
                .collect()?;

            if failures.height() == 0 {
                continue;
            }

            let samples = sample_values(&failures, column)?;
            match self.policy {
                CastPolicy::Strict => {
                    return Err(RefineError::Cast {
                        column: column.to_string(),
                        rows: failures.height(),
                        samples,
                    });
                }
                CastPolicy::NullOnError => {
                    warn!(
                        "Nulled {} unparseable value(s) in '{}' (e.g. {})",
                        failures.height(),
                        column,
                        samples.join(", ")
                    );
                    values_nulled += failures.height();
                }
            }
        }

        let frame = frame.with_columns([
            parse_quantity(col(QUANTIDADE_TEORICA)).alias(QUANTIDADE_TEORICA),
            parse_percentage(col(PARTICIPACAO_PERCENTUAL)).alias(PARTICIPACAO_PERCENTUAL),
        ]);

        info!("Columns cast");
        Ok(CastOutcome {
            frame,
            values_nulled,
        })
    }

    /// Rename, then cast
    pub fn normalize(&self, frame: LazyFrame) -> Result<CastOutcome> {
        let renamed = self.rename(frame)?;
        let mut outcome = self.cast(renamed)?;

        let schema = outcome.frame.collect_schema()?;
        debug!("Normalized schema: {:?}", schema);

        Ok(outcome)
    }
}

/// "1.234.567" -> 1234567; text that is not a grouped digit string becomes null
pub fn parse_quantity(text: Expr) -> Expr {
    let text = text.cast(DataType::String);
    let parsed = text
        .clone()
        .str()
        .replace_all(lit(THOUSANDS_SEPARATOR), lit(""), true)
        .cast(DataType::Int64);

    when(text.str().contains(lit(QUANTITY_PATTERN), true))
        .then(parsed)
        .otherwise(lit(NULL).cast(DataType::Int64))
}

/// "12,34" -> 12.34; text that is not a plain decimal number becomes null
pub fn parse_percentage(text: Expr) -> Expr {
    let text = text.cast(DataType::String);
    let parsed = text
        .clone()
        .str()
        .replace_all(lit(DECIMAL_SEPARATOR), lit("."), true)
        .cast(DataType::Float64);

    when(text.str().contains(lit(PERCENTAGE_PATTERN), true))
        .then(parsed)
        .otherwise(lit(NULL).cast(DataType::Float64))
}

fn parse_failed(column: &str) -> Expr {
    let parsed = if column == QUANTIDADE_TEORICA {
        parse_quantity(col(column))
    } else {
        parse_percentage(col(column))
    };
    parsed.is_null()
}

fn sample_values(failures: &DataFrame, column: &str) -> Result<Vec<String>> {
    let values = failures.column(column)?.cast(&DataType::String)?;
    let samples = values
        .str()?
        .into_iter()
        .take(CAST_ERROR_SAMPLES)
        .map(|value| match value {
            Some(text) => format!("'{}'", text),
            None => "null".to_string(),
        })
        .collect();
    Ok(samples)
}
