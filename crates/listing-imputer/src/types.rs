use crate::encoder::EncodingTable;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Declared kind of a column, deciding regressor vs classifier when the
/// column is an imputation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Real-valued column, imputed with a neighbor regressor.
    Continuous,
    /// Label-encoded column, imputed with a neighbor classifier.
    Categorical,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the imputation of a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnImputationSummary {
    /// Name of the imputed column.
    pub column: String,
    /// Kind used to pick regressor or classifier.
    pub kind: ColumnKind,
    /// Number of missing values before the run.
    pub missing_before: usize,
    /// Number of values written by the neighbor model.
    pub imputed: usize,
    /// Neighbor count used for the final model.
    pub chosen_k: usize,
    /// 1-indexed grid position of the winner in each cross-validation repetition.
    pub winning_positions: Vec<usize>,
    /// Other columns that received median placeholders for this target.
    pub placeholder_columns: Vec<String>,
}

/// Audit record of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationReport {
    pub started_at: String,
    pub duration_ms: u64,
    pub total_rows: usize,
    /// Rows in the fully-observed training pool.
    pub observed_rows: usize,
    /// Rows with at least one missing value in the MissingSet.
    pub missing_rows: usize,
    /// Columns that were label-encoded before imputation.
    pub encoded_columns: Vec<String>,
    pub columns: Vec<ColumnImputationSummary>,
}

impl ImputationReport {
    /// Total number of values written across all columns.
    pub fn total_imputed(&self) -> usize {
        self.columns.iter().map(|c| c.imputed).sum()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnImputationSummary> {
        self.columns.iter().find(|c| c.column == name)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a successful imputation run.
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    /// Encoded, imputed and rounded dataset in input row and column order.
    pub data: DataFrame,
    /// Code tables for every label-encoded column.
    pub encoding: EncodingTable,
    pub report: ImputationReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ColumnKind::Categorical).unwrap(),
            "\"categorical\""
        );
        let kind: ColumnKind = serde_json::from_str("\"continuous\"").unwrap();
        assert_eq!(kind, ColumnKind::Continuous);
        assert_eq!(ColumnKind::Continuous.to_string(), "continuous");
    }

    #[test]
    fn test_report_totals() {
        let report = ImputationReport {
            started_at: "2024-01-01 00:00:00".to_string(),
            duration_ms: 5,
            total_rows: 10,
            observed_rows: 8,
            missing_rows: 2,
            encoded_columns: vec!["property_type".to_string()],
            columns: vec![
                ColumnImputationSummary {
                    column: "bedrooms".to_string(),
                    kind: ColumnKind::Continuous,
                    missing_before: 2,
                    imputed: 2,
                    chosen_k: 3,
                    winning_positions: vec![3, 3],
                    placeholder_columns: vec!["property_type".to_string()],
                },
                ColumnImputationSummary {
                    column: "property_type".to_string(),
                    kind: ColumnKind::Categorical,
                    missing_before: 1,
                    imputed: 1,
                    chosen_k: 1,
                    winning_positions: vec![1, 1],
                    placeholder_columns: Vec::new(),
                },
            ],
        };

        assert_eq!(report.total_imputed(), 3);
        assert_eq!(report.column("bedrooms").unwrap().chosen_k, 3);
        assert!(report.column("price").is_none());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"winning_positions\""));
        assert!(json.contains("\"categorical\""));
    }
}
