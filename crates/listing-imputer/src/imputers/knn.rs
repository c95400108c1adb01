use crate::error::{ImputationError, Result};
use crate::types::ColumnKind;
use crate::utils::{column_values, feature_columns, feature_matrix};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Failures of the bare neighbor model, before a column name is attached.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("model was fitted on {expected} features, got {found}")]
    FeatureCountMismatch { expected: usize, found: usize },
}

/// Brute-force k-nearest-neighbor model over a dense feature matrix.
///
/// Distances are Euclidean and neighbors vote with uniform weight. A
/// continuous target is predicted as the mean of the neighbors' targets, a
/// categorical one by majority vote with ties going to the smallest code.
#[derive(Debug, Clone)]
pub struct NeighborModel {
    kind: ColumnKind,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
}

impl NeighborModel {
    /// Store the training data.
    pub fn fit(
        kind: ColumnKind,
        x: Array2<f64>,
        y: Array1<f64>,
    ) -> std::result::Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.nrows() != y.len() {
            return Err(ModelError::LengthMismatch {
                features: x.nrows(),
                targets: y.len(),
            });
        }

        Ok(Self {
            kind,
            x_train: x,
            y_train: y,
        })
    }

    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    /// Predict every row of `x` with `k` neighbors.
    ///
    /// `k` is clamped to the training set size.
    pub fn predict(&self, x: &Array2<f64>, k: usize) -> std::result::Result<Array1<f64>, ModelError> {
        let mut grid = self.predict_grid(x, &[k])?;
        Ok(grid.remove(0))
    }

    /// Predictions for several neighbor counts, sharing one neighbor ordering per row.
    ///
    /// The result holds one prediction vector per entry of `ks`, in order.
    pub fn predict_grid(
        &self,
        x: &Array2<f64>,
        ks: &[usize],
    ) -> std::result::Result<Vec<Array1<f64>>, ModelError> {
        if x.ncols() != self.x_train.ncols() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.x_train.ncols(),
                found: x.ncols(),
            });
        }

        let mut predictions: Vec<Array1<f64>> =
            ks.iter().map(|_| Array1::zeros(x.nrows())).collect();

        for (row_idx, row) in x.axis_iter(Axis(0)).enumerate() {
            let order = self.neighbor_order(row);
            for (slot, &k) in ks.iter().enumerate() {
                let k = k.clamp(1, order.len());
                predictions[slot][row_idx] = self.aggregate(&order[..k]);
            }
        }

        Ok(predictions)
    }

    /// Training rows sorted by distance to `row`; equal distances keep training order.
    fn neighbor_order(&self, row: ArrayView1<f64>) -> Vec<usize> {
        let mut distances: Vec<(usize, f64)> = self
            .x_train
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(idx, train_row)| (idx, euclidean_distance(row, train_row)))
            .collect();

        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.into_iter().map(|(idx, _)| idx).collect()
    }

    fn aggregate(&self, neighbors: &[usize]) -> f64 {
        match self.kind {
            ColumnKind::Continuous => {
                let sum: f64 = neighbors.iter().map(|&idx| self.y_train[idx]).sum();
                sum / neighbors.len() as f64
            }
            ColumnKind::Categorical => {
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for &idx in neighbors {
                    *votes.entry(self.y_train[idx].round() as i64).or_insert(0) += 1;
                }

                // BTreeMap iterates codes in ascending order, so the strict
                // comparison keeps the smallest code among tied counts.
                let mut best = (0i64, 0usize);
                for (code, count) in votes {
                    if count > best.1 {
                        best = (code, count);
                    }
                }
                best.0 as f64
            }
        }
    }
}

/// Euclidean distance between two feature rows.
fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Values predicted for the rows of a frame where the target was missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    /// Row positions within the prediction frame.
    pub rows: Vec<usize>,
    pub values: Vec<f64>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Neighbor imputer for a single target column.
///
/// Fitted on the fully-observed training pool; predicts the target for the
/// rows of another frame where it is missing, using every other column
/// (minus `excluded`) as features.
pub struct NeighborImputer {
    target: String,
    features: Vec<String>,
    excluded: Vec<String>,
    model: NeighborModel,
}

impl NeighborImputer {
    /// Fit on the training pool.
    ///
    /// `excluded` names columns that are neither target nor feature, such as
    /// the price column.
    pub fn fit(
        pool: &DataFrame,
        target: &str,
        kind: ColumnKind,
        excluded: &[String],
    ) -> Result<Self> {
        let features = Self::feature_names(pool, target, excluded);
        let (x, y) = training_data(pool, target, &features)?;

        if kind == ColumnKind::Categorical {
            ensure_multiple_classes(target, &y)?;
        }

        let model = NeighborModel::fit(kind, x, y).map_err(|e| match e {
            ModelError::EmptyTrainingSet => {
                ImputationError::degenerate(target, "fully-observed pool is empty")
            }
            other => ImputationError::model_fit(target, other.to_string()),
        })?;

        debug!(
            "Fitted {} neighbor model for '{}' on {} rows x {} features",
            kind,
            target,
            model.n_train(),
            features.len()
        );

        Ok(Self {
            target: target.to_string(),
            features,
            excluded: excluded.to_vec(),
            model,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Predict the target for every row of `frame` where it is missing.
    ///
    /// `frame` must expose the same feature columns, in the same order, as the
    /// training pool, and those features must be complete.
    pub fn predict_missing(&self, frame: &DataFrame, k: usize) -> Result<Predictions> {
        let found = Self::feature_names(frame, &self.target, &self.excluded);
        if found != self.features {
            return Err(ImputationError::DimensionMismatch {
                expected: self.features.clone(),
                found,
            });
        }

        let rows: Vec<usize> = column_values(frame, &self.target)?
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(idx, _)| idx)
            .collect();

        if rows.is_empty() {
            return Ok(Predictions {
                rows,
                values: Vec::new(),
            });
        }

        let x = feature_matrix(frame, &self.features)?.select(Axis(0), &rows);
        let values = self
            .model
            .predict(&x, k)
            .map_err(|e| ImputationError::model_fit(self.target.as_str(), e.to_string()))?
            .to_vec();

        Ok(Predictions { rows, values })
    }

    fn feature_names(df: &DataFrame, target: &str, excluded: &[String]) -> Vec<String> {
        let mut skip: Vec<&str> = excluded.iter().map(String::as_str).collect();
        skip.push(target);
        feature_columns(df, &skip)
    }
}

/// Feature matrix and complete target vector of the training pool.
pub(crate) fn training_data(
    pool: &DataFrame,
    target: &str,
    features: &[String],
) -> Result<(Array2<f64>, Array1<f64>)> {
    let x = feature_matrix(pool, features)?;
    let y = column_values(pool, target)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                ImputationError::schema(
                    target,
                    format!("training pool row {} has no target value", row),
                )
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok((x, Array1::from(y)))
}

/// A classifier needs at least two observed classes.
pub(crate) fn ensure_multiple_classes(target: &str, y: &Array1<f64>) -> Result<()> {
    let mut classes = y.iter().map(|v| v.round() as i64);
    let Some(first) = classes.next() else {
        return Ok(());
    };
    if classes.all(|c| c == first) {
        return Err(ImputationError::model_fit(
            target,
            format!("only one class ({}) observed in the training pool", first),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // ========================================================================
    // NeighborModel tests
    // ========================================================================

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert_eq!(
            NeighborModel::fit(ColumnKind::Continuous, x, y).unwrap_err(),
            ModelError::EmptyTrainingSet
        );
    }

    #[test]
    fn test_fit_rejects_length_mismatch() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert!(matches!(
            NeighborModel::fit(ColumnKind::Continuous, x, y),
            Err(ModelError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_regression_averages_nearest_targets() {
        let x = array![[1.0], [2.0], [3.0], [10.0]];
        let y = array![10.0, 20.0, 30.0, 100.0];
        let model = NeighborModel::fit(ColumnKind::Continuous, x, y).unwrap();

        let preds = model.predict(&array![[2.1]], 3).unwrap();
        assert!((preds[0] - 20.0).abs() < 1e-10);

        let preds = model.predict(&array![[9.0]], 1).unwrap();
        assert_eq!(preds[0], 100.0);
    }

    #[test]
    fn test_k_is_clamped_to_training_size() {
        let x = array![[0.0], [1.0]];
        let y = array![2.0, 4.0];
        let model = NeighborModel::fit(ColumnKind::Continuous, x, y).unwrap();

        let preds = model.predict(&array![[0.0]], 13).unwrap();
        assert_eq!(preds[0], 3.0);
    }

    #[test]
    fn test_classification_majority_vote() {
        let x = array![[0.0], [0.1], [0.2], [5.0]];
        let y = array![1.0, 1.0, 2.0, 2.0];
        let model = NeighborModel::fit(ColumnKind::Categorical, x, y).unwrap();

        let preds = model.predict(&array![[0.05]], 3).unwrap();
        assert_eq!(preds[0], 1.0);
    }

    #[test]
    fn test_classification_tie_goes_to_smallest_code() {
        let x = array![[0.0], [1.0]];
        let y = array![2.0, 0.0];
        let model = NeighborModel::fit(ColumnKind::Categorical, x, y).unwrap();

        let preds = model.predict(&array![[0.5]], 2).unwrap();
        assert_eq!(preds[0], 0.0);
    }

    #[test]
    fn test_distance_ties_keep_training_order() {
        let x = array![[1.0], [-1.0]];
        let y = array![5.0, 7.0];
        let model = NeighborModel::fit(ColumnKind::Continuous, x, y).unwrap();

        let preds = model.predict(&array![[0.0]], 1).unwrap();
        assert_eq!(preds[0], 5.0);
    }

    #[test]
    fn test_predict_grid_matches_individual_predictions() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let model = NeighborModel::fit(ColumnKind::Continuous, x, y).unwrap();
        let query = array![[0.2, 0.1], [3.9, 4.2]];

        let grid = model.predict_grid(&query, &[1, 3, 5]).unwrap();
        for (slot, k) in [1, 3, 5].into_iter().enumerate() {
            assert_eq!(grid[slot], model.predict(&query, k).unwrap());
        }
    }

    #[test]
    fn test_predict_rejects_feature_count_mismatch() {
        let model =
            NeighborModel::fit(ColumnKind::Continuous, array![[0.0, 1.0]], array![1.0]).unwrap();
        assert_eq!(
            model.predict(&array![[0.0]], 1).unwrap_err(),
            ModelError::FeatureCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_euclidean_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(euclidean_distance(a.view(), b.view()), 5.0);
    }

    // ========================================================================
    // NeighborImputer tests
    // ========================================================================

    fn pool() -> DataFrame {
        df![
            "sqft" => [500.0, 520.0, 1500.0, 1550.0, 3000.0],
            "bedrooms" => [1.0, 1.0, 3.0, 3.0, 5.0],
            "price" => [100.0, 110.0, 300.0, 310.0, 900.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_imputer_predicts_only_missing_rows() {
        let imputer =
            NeighborImputer::fit(&pool(), "bedrooms", ColumnKind::Continuous, &["price".into()])
                .unwrap();
        assert_eq!(imputer.features(), &["sqft".to_string()]);

        let frame = df![
            "sqft" => [510.0, 1520.0, 2990.0],
            "bedrooms" => [None, Some(2.0), None],
            "price" => [Some(1.0), Some(2.0), None],
        ]
        .unwrap();

        let preds = imputer.predict_missing(&frame, 1).unwrap();
        assert_eq!(preds.rows, vec![0, 2]);
        assert_eq!(preds.values, vec![1.0, 5.0]);
    }

    #[test]
    fn test_imputer_rejects_mismatched_columns() {
        let imputer =
            NeighborImputer::fit(&pool(), "bedrooms", ColumnKind::Continuous, &["price".into()])
                .unwrap();

        let frame = df![
            "sqft" => [510.0],
            "bathrooms" => [1.0],
            "bedrooms" => [Option::<f64>::None],
        ]
        .unwrap();

        assert!(matches!(
            imputer.predict_missing(&frame, 1),
            Err(ImputationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_imputer_single_class_is_model_fit_error() {
        let pool = df![
            "sqft" => [500.0, 600.0, 700.0],
            "property_type" => [2i64, 2, 2],
        ]
        .unwrap();

        assert!(matches!(
            NeighborImputer::fit(&pool, "property_type", ColumnKind::Categorical, &[]),
            Err(ImputationError::ModelFit { .. })
        ));
    }

    #[test]
    fn test_imputer_empty_pool_is_degenerate() {
        let pool = df![
            "sqft" => Vec::<f64>::new(),
            "bedrooms" => Vec::<f64>::new(),
        ]
        .unwrap();

        assert!(matches!(
            NeighborImputer::fit(&pool, "bedrooms", ColumnKind::Continuous, &[]),
            Err(ImputationError::DegenerateTraining { .. })
        ));
    }

    #[test]
    fn test_imputer_with_no_missing_rows_predicts_nothing() {
        let imputer =
            NeighborImputer::fit(&pool(), "bedrooms", ColumnKind::Continuous, &["price".into()])
                .unwrap();
        let preds = imputer.predict_missing(&pool(), 3).unwrap();
        assert!(preds.is_empty());
    }
}
