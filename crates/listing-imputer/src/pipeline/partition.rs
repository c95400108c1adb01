//! Row partition by missingness, and the inverse merge.

use crate::error::{ImputationError, Result};
use crate::utils::{ROW_INDEX_COLUMN, column_values, row_positions};
use polars::prelude::*;
use tracing::debug;

/// Rows split by whether any MissingSet column is missing.
///
/// Both frames carry [`ROW_INDEX_COLUMN`] with the original row position.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Rows with no gap in any MissingSet column: the training pool.
    pub observed: DataFrame,
    /// Rows with at least one gap.
    pub missing: DataFrame,
}

impl Partition {
    pub fn total_rows(&self) -> usize {
        self.observed.height() + self.missing.height()
    }
}

pub struct MissingnessPartitioner;

impl MissingnessPartitioner {
    /// Split `df` on the MissingSet. Every row lands in exactly one frame,
    /// and each frame keeps the input row order.
    pub fn split(df: &DataFrame, missing_set: &[String]) -> Result<Partition> {
        if df.column(ROW_INDEX_COLUMN).is_ok() {
            return Err(ImputationError::schema(
                ROW_INDEX_COLUMN,
                "reserved column name already present in the dataset",
            ));
        }

        let height = df.height();
        let mut indexed = df.clone();
        let index: Vec<u32> = (0..height as u32).collect();
        indexed.with_column(Series::new(ROW_INDEX_COLUMN.into(), index))?;

        let mut has_gap = vec![false; height];
        for column in missing_set {
            for (row, value) in column_values(df, column)?.iter().enumerate() {
                if value.is_none() {
                    has_gap[row] = true;
                }
            }
        }

        let complete: Vec<bool> = has_gap.iter().map(|gap| !gap).collect();
        let observed = indexed.filter(&BooleanChunked::from_slice("mask".into(), &complete))?;
        let missing = indexed.filter(&BooleanChunked::from_slice("mask".into(), &has_gap))?;

        debug!(
            "Partitioned {} rows: {} fully observed, {} with gaps",
            height,
            observed.height(),
            missing.height()
        );

        Ok(Partition { observed, missing })
    }

    /// Rebuild `columns` of `base` from the two halves of a partition.
    ///
    /// Values are scattered back by original row position, so `base` keeps
    /// its row order and every column outside `columns` is left untouched.
    /// The rebuilt columns are `Float64`.
    pub fn merge(base: &DataFrame, partition: &Partition, columns: &[String]) -> Result<DataFrame> {
        let height = base.height();
        let observed_rows = row_positions(&partition.observed)?;
        let missing_rows = row_positions(&partition.missing)?;

        let mut seen = vec![false; height];
        for &row in observed_rows.iter().chain(missing_rows.iter()) {
            if row >= height || seen[row] {
                return Err(ImputationError::schema(
                    ROW_INDEX_COLUMN,
                    format!("row {} is duplicated or out of range after imputation", row),
                ));
            }
            seen[row] = true;
        }
        if let Some(row) = seen.iter().position(|s| !s) {
            return Err(ImputationError::schema(
                ROW_INDEX_COLUMN,
                format!("row {} was dropped during imputation", row),
            ));
        }

        let mut merged = base.clone();
        for column in columns {
            let mut values: Vec<Option<f64>> = vec![None; height];
            for (part, rows) in [
                (&partition.observed, &observed_rows),
                (&partition.missing, &missing_rows),
            ] {
                for (value, &row) in column_values(part, column)?.into_iter().zip(rows.iter()) {
                    values[row] = value;
                }
            }
            merged.replace(column, Series::new(column.as_str().into(), values))?;
        }

        Ok(merged)
    }
}
