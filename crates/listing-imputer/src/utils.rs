//! Shared helpers for moving between polars frames and plain numeric buffers.

use crate::error::{ImputationError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Name of the column carrying each row's original position.
pub const ROW_INDEX_COLUMN: &str = "__row_index";

/// Textual null tokens recognized when reading delimited files. Empty fields
/// are null already.
pub const NULL_TOKENS: [&str; 5] = ["NA", "N/A", "NaN", "null", "#N/A"];

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

// =============================================================================
// Column Access
// =============================================================================

/// Read a column as `f64` values, treating nulls and `NaN` as missing.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| ImputationError::ColumnNotFound(name.to_string()))?;
    let floats = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Original row positions stored in [`ROW_INDEX_COLUMN`].
pub fn row_positions(df: &DataFrame) -> Result<Vec<usize>> {
    let column = df
        .column(ROW_INDEX_COLUMN)
        .map_err(|_| ImputationError::ColumnNotFound(ROW_INDEX_COLUMN.to_string()))?;
    let positions = column.as_materialized_series().cast(&DataType::UInt64)?;
    Ok(positions
        .u64()?
        .into_iter()
        .map(|v| v.unwrap_or_default() as usize)
        .collect())
}

/// Number of missing values in a column (nulls and `NaN`).
pub fn missing_count(df: &DataFrame, name: &str) -> Result<usize> {
    Ok(column_values(df, name)?
        .iter()
        .filter(|v| v.is_none())
        .count())
}

/// Column names in frame order, skipping the row index and `exclude`.
pub fn feature_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| name != ROW_INDEX_COLUMN && !exclude.contains(&name.as_str()))
        .collect()
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill missing values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let floats = series.cast(&DataType::Float64)?;
    let filled: Vec<Option<f64>> = floats
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => Some(x),
            _ => Some(fill_value),
        })
        .collect();

    Ok(Series::new(series.name().clone(), filled))
}

/// Median of the non-missing values in a column.
pub fn column_median(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    let present: Vec<f64> = column_values(df, name)?.into_iter().flatten().collect();
    Ok(Series::new(name.into(), present).median())
}

/// Dense row-major matrix of the given columns.
///
/// Every cell must be present; the neighbor models have no notion of a
/// missing coordinate.
pub fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let mut matrix = Array2::<f64>::zeros((n_rows, n_cols));

    for (col_idx, name) in columns.iter().enumerate() {
        for (row_idx, value) in column_values(df, name)?.into_iter().enumerate() {
            matrix[[row_idx, col_idx]] = value.ok_or_else(|| {
                ImputationError::schema(
                    name.as_str(),
                    format!("feature value missing in row {}", row_idx),
                )
            })?;
        }
    }

    Ok(matrix)
}
