//! Boundary contract of an imputation run.
//!
//! The upstream cleaning stage declares which columns contain gaps, which
//! kind each column is, and which column holds the price. Everything is
//! checked against the actual frame before any work starts.

use crate::error::{ImputationError, Result};
use crate::types::ColumnKind;
use crate::utils::{is_float_dtype, is_numeric_dtype, missing_count};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declared layout of the dataset handed to the imputer.
///
/// # Example
///
/// ```rust,ignore
/// let schema = ImputationSchema::new(["bedrooms", "property_type"])
///     .with_kind("property_type", ColumnKind::Categorical)
///     .with_target("price");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputationSchema {
    missing_columns: Vec<String>,
    kinds: HashMap<String, ColumnKind>,
    target_column: Option<String>,
}

impl ImputationSchema {
    /// Register the MissingSet. Order is the imputation order.
    pub fn new<I, S>(missing_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            missing_columns: missing_columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Declare the kind of a column.
    pub fn with_kind(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.kinds.insert(column.into(), kind);
        self
    }

    /// Name the price column, which is neither imputed nor used as a feature.
    pub fn with_target(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }

    pub fn target_column(&self) -> Option<&str> {
        self.target_column.as_deref()
    }

    pub fn declared_kind(&self, column: &str) -> Option<ColumnKind> {
        self.kinds.get(column).copied()
    }

    /// Columns that are never features: the price column, if any.
    pub(crate) fn excluded_columns(&self) -> Vec<String> {
        self.target_column.iter().cloned().collect()
    }

    /// Check the declaration against the raw (pre-encoding) frame and resolve
    /// the kind of every MissingSet column.
    ///
    /// Undeclared MissingSet columns take their kind from the dtype: numeric
    /// columns are continuous, everything else is categorical.
    pub fn resolve(&self, raw: &DataFrame) -> Result<Vec<(String, ColumnKind)>> {
        let mut seen = HashSet::new();
        for column in &self.missing_columns {
            if !seen.insert(column.as_str()) {
                return Err(ImputationError::schema(
                    column.as_str(),
                    "registered more than once in the missing set",
                ));
            }
            if raw.column(column).is_err() {
                return Err(ImputationError::schema(
                    column.as_str(),
                    "declared as missing but absent from the dataset",
                ));
            }
        }

        if let Some(target) = &self.target_column {
            if raw.column(target).is_err() {
                return Err(ImputationError::schema(
                    target.as_str(),
                    "price column absent from the dataset",
                ));
            }
            if seen.contains(target.as_str()) {
                return Err(ImputationError::schema(
                    target.as_str(),
                    "price column cannot be imputed",
                ));
            }
        }

        for (column, kind) in &self.kinds {
            let series = raw
                .column(column)
                .map_err(|_| {
                    ImputationError::schema(
                        column.as_str(),
                        "kind declared for a column absent from the dataset",
                    )
                })?
                .as_materialized_series();
            check_kind(series, *kind)?;
        }

        self.missing_columns
            .iter()
            .map(|column| -> Result<(String, ColumnKind)> {
                let kind = match self.declared_kind(column) {
                    Some(kind) => kind,
                    None => infer_kind(raw.column(column)?.dtype()),
                };
                Ok((column.clone(), kind))
            })
            .collect()
    }

    /// Every feature column outside the MissingSet must be complete.
    pub(crate) fn check_complete_features(&self, encoded: &DataFrame) -> Result<()> {
        for name in encoded.get_column_names() {
            let name = name.as_str();
            if self.missing_columns.iter().any(|c| c == name)
                || self.target_column.as_deref() == Some(name)
            {
                continue;
            }
            let gaps = missing_count(encoded, name)?;
            if gaps > 0 {
                return Err(ImputationError::schema(
                    name,
                    format!(
                        "{} missing values but the column is not registered in the missing set",
                        gaps
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn infer_kind(dtype: &DataType) -> ColumnKind {
    if is_numeric_dtype(dtype) {
        ColumnKind::Continuous
    } else {
        ColumnKind::Categorical
    }
}

/// Declared kind must agree with the values actually stored.
fn check_kind(series: &Series, kind: ColumnKind) -> Result<()> {
    let dtype = series.dtype();
    match kind {
        ColumnKind::Continuous if !is_numeric_dtype(dtype) => Err(ImputationError::schema(
            series.name().as_str(),
            format!("declared continuous but stored as {:?}", dtype),
        )),
        ColumnKind::Categorical if is_float_dtype(dtype) => {
            let floats = series.cast(&DataType::Float64)?;
            let fractional = floats
                .f64()?
                .into_iter()
                .flatten()
                .find(|v| !v.is_nan() && v.fract() != 0.0);
            match fractional {
                Some(value) => Err(ImputationError::schema(
                    series.name().as_str(),
                    format!("declared categorical but holds non-integral value {}", value),
                )),
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}
