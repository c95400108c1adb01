//! Median placeholders for the columns that are not being imputed.
//!
//! A neighbor model cannot consume a row with gaps, so before predicting a
//! target every *other* MissingSet column of the rows to predict receives its
//! median as a temporary value. The placeholders live only in the copy handed
//! to the model.

use crate::error::Result;
use crate::utils::{column_median, fill_numeric_nulls, missing_count};
use polars::prelude::*;
use tracing::{debug, warn};

/// A placeholder-filled copy of a frame.
#[derive(Debug, Clone)]
pub struct PlaceholderFill {
    pub frame: DataFrame,
    /// Columns that actually had gaps and received a median.
    pub filled_columns: Vec<String>,
}

/// Median placeholder filling, recomputed for every target column.
pub struct PlaceholderFiller;

impl PlaceholderFiller {
    /// Fill every column of `missing_set` except `target` with its median
    /// over `frame` itself.
    ///
    /// When a column has no present value at all in `frame`, the median of
    /// `fallback` (the training pool) is used instead.
    pub fn fill(
        frame: &DataFrame,
        target: &str,
        missing_set: &[String],
        fallback: &DataFrame,
    ) -> Result<PlaceholderFill> {
        let mut filled = frame.clone();
        let mut filled_columns = Vec::new();

        for column in missing_set.iter().filter(|c| c.as_str() != target) {
            if missing_count(frame, column)? == 0 {
                continue;
            }

            let median = match column_median(frame, column)? {
                Some(median) => median,
                None => {
                    let Some(median) = column_median(fallback, column)? else {
                        warn!(
                            "No value of '{}' observed anywhere; leaving gaps for the model to reject",
                            column
                        );
                        continue;
                    };
                    warn!(
                        "'{}' has no values in the rows being filled; using training pool median {}",
                        column, median
                    );
                    median
                }
            };

            let series = frame.column(column)?.as_materialized_series().clone();
            filled.replace(column, fill_numeric_nulls(&series, median)?)?;
            debug!("Placeholder for '{}' (target '{}'): {}", column, target, median);
            filled_columns.push(column.clone());
        }

        Ok(PlaceholderFill {
            frame: filled,
            filled_columns,
        })
    }
}
