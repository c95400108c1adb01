//! Label encoding of non-numeric columns.
//!
//! Each non-numeric column gets its own dense code space: the distinct
//! non-missing values are sorted and numbered from zero. The code table is
//! kept in an [`EncodingTable`] so imputed codes can be mapped back to labels.

use crate::error::{ImputationError, Result};
use crate::utils::{is_float_dtype, is_numeric_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Labels of one encoded column; a label's code is its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub name: String,
    pub labels: Vec<String>,
}

/// Code -> label tables for every encoded column, in frame order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTable {
    columns: Vec<EncodedColumn>,
}

impl EncodingTable {
    pub fn is_encoded(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn labels(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.labels.as_slice())
    }

    /// Names of the encoded columns.
    pub fn encoded_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Label for `code` in `column`, if both exist.
    pub fn decode_value(&self, column: &str, code: i64) -> Option<&str> {
        let labels = self.labels(column)?;
        usize::try_from(code)
            .ok()
            .and_then(|idx| labels.get(idx))
            .map(String::as_str)
    }

    /// Replace the codes of every encoded column in `df` by their labels.
    ///
    /// Columns of `df` that were not encoded are left as they are.
    pub fn decode_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut decoded = df.clone();

        for encoded in &self.columns {
            let Ok(column) = df.column(&encoded.name) else {
                continue;
            };
            let codes = column.as_materialized_series().cast(&DataType::Float64)?;
            let mut labels = Vec::with_capacity(codes.len());

            for code in codes.f64()?.into_iter() {
                match code {
                    Some(code) => {
                        let label = self
                            .decode_value(&encoded.name, code.round() as i64)
                            .ok_or_else(|| {
                                ImputationError::schema(
                                    encoded.name.as_str(),
                                    format!("code {} has no label", code),
                                )
                            })?;
                        labels.push(Some(label.to_string()));
                    }
                    None => labels.push(None),
                }
            }

            decoded.replace(
                &encoded.name,
                Series::new(encoded.name.as_str().into(), labels),
            )?;
        }

        Ok(decoded)
    }
}

/// Label encoder for the raw listing frame.
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    /// Encode every non-numeric column and normalize float `NaN` to null.
    ///
    /// Only real nulls count as missing: every observed label, whatever its
    /// text, gets a code. Numeric columns without `NaN` and the columns named
    /// in `skip` are returned untouched.
    pub fn fit_transform(df: &DataFrame, skip: &[String]) -> Result<(DataFrame, EncodingTable)> {
        let mut encoded = df.clone();
        let mut table = EncodingTable::default();

        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for name in names.iter().filter(|n| !skip.contains(*n)) {
            let series = df.column(name)?.as_materialized_series().clone();
            let dtype = series.dtype().clone();

            if is_numeric_dtype(&dtype) {
                if is_float_dtype(&dtype) {
                    if let Some(normalized) = Self::normalize_nan(&series)? {
                        encoded.replace(name, normalized)?;
                    }
                }
                continue;
            }

            let (codes, labels) = Self::encode_series(&series)?;
            debug!("Encoded '{}' ({:?}) into {} codes", name, dtype, labels.len());
            encoded.replace(name, codes)?;
            table.columns.push(EncodedColumn {
                name: name.clone(),
                labels,
            });
        }

        Ok((encoded, table))
    }

    /// Codes for a non-numeric series plus the sorted label list.
    fn encode_series(series: &Series) -> Result<(Series, Vec<String>)> {
        let as_str = series.cast(&DataType::String)?;
        let values: Vec<Option<String>> = as_str
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();

        let labels: Vec<String> = values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let code_of: HashMap<&str, i64> = labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.as_str(), code as i64))
            .collect();

        let codes: Vec<Option<i64>> = values
            .iter()
            .map(|v| v.as_deref().and_then(|s| code_of.get(s).copied()))
            .collect();

        Ok((Series::new(series.name().clone(), codes), labels))
    }

    /// `Some` with a Float64 copy where `NaN` became null, `None` if there was no `NaN`.
    fn normalize_nan(series: &Series) -> Result<Option<Series>> {
        let floats = series.cast(&DataType::Float64)?;
        let chunked = floats.f64()?;
        if !chunked.into_iter().any(|v| v.is_some_and(f64::is_nan)) {
            return Ok(None);
        }

        let values: Vec<Option<f64>> = chunked
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(Some(Series::new(series.name().clone(), values)))
    }
}
