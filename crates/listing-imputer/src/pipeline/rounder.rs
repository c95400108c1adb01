//! Rounds imputed columns to integers.

use crate::config::RoundingMode;
use crate::error::{ImputationError, Result};
use crate::utils::is_float_dtype;
use polars::prelude::*;

pub struct Rounder;

impl Rounder {
    /// Round every value of `columns` to the nearest integer under `mode`.
    ///
    /// Integer columns are already integral and are returned as is; float
    /// columns stay `Float64`. Nulls are preserved. Other columns of `df`
    /// are not touched. Rounding an already rounded frame is a no-op.
    pub fn round(df: &DataFrame, columns: &[String], mode: RoundingMode) -> Result<DataFrame> {
        let mut rounded = df.clone();

        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| ImputationError::ColumnNotFound(name.clone()))?;
            let series = column.as_materialized_series();
            if !is_float_dtype(series.dtype()) {
                continue;
            }

            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = floats
                .f64()?
                .into_iter()
                .map(|v| v.map(|x| mode.apply(x)))
                .collect();
            rounded.replace(name, Series::new(name.as_str().into(), values))?;
        }

        Ok(rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_values;

    fn frame() -> DataFrame {
        df![
            "bedrooms" => [Some(1.4), Some(2.5), Some(3.5), None, Some(-2.5)],
            "property_type" => [0i64, 1, 2, 1, 0],
            "lat" => [47.61, 47.62, 47.63, 47.64, 47.65],
        ]
        .unwrap()
    }

    fn columns() -> Vec<String> {
        vec!["bedrooms".to_string(), "property_type".to_string()]
    }

    #[test]
    fn test_half_to_even() {
        let rounded = Rounder::round(&frame(), &columns(), RoundingMode::HalfToEven).unwrap();
        assert_eq!(
            column_values(&rounded, "bedrooms").unwrap(),
            vec![Some(1.0), Some(2.0), Some(4.0), None, Some(-2.0)]
        );
    }

    #[test]
    fn test_half_away_from_zero() {
        let rounded =
            Rounder::round(&frame(), &columns(), RoundingMode::HalfAwayFromZero).unwrap();
        assert_eq!(
            column_values(&rounded, "bedrooms").unwrap(),
            vec![Some(1.0), Some(3.0), Some(4.0), None, Some(-3.0)]
        );
    }

    #[test]
    fn test_untouched_columns_and_integer_columns() {
        let df = frame();
        let rounded = Rounder::round(&df, &columns(), RoundingMode::HalfToEven).unwrap();
        assert!(rounded.column("lat").unwrap().as_materialized_series().equals(
            df.column("lat").unwrap().as_materialized_series()
        ));
        assert_eq!(
            rounded.column("property_type").unwrap().dtype(),
            &DataType::Int64
        );
    }

    #[test]
    fn test_rounding_is_idempotent() {
        for mode in [RoundingMode::HalfToEven, RoundingMode::HalfAwayFromZero] {
            let once = Rounder::round(&frame(), &columns(), mode).unwrap();
            let twice = Rounder::round(&once, &columns(), mode).unwrap();
            assert!(once.equals_missing(&twice));
        }
    }

    #[test]
    fn test_unknown_column() {
        let result = Rounder::round(
            &frame(),
            &["bathrooms".to_string()],
            RoundingMode::HalfToEven,
        );
        assert!(matches!(result, Err(ImputationError::ColumnNotFound(_))));
    }
}
