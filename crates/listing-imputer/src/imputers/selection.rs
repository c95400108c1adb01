//! Cross-validated choice of the neighbor count for one target column.

use super::knn::{NeighborModel, ensure_multiple_classes, training_data};
use crate::config::{ImputerConfig, KSelection};
use crate::error::{ImputationError, Result};
use crate::types::ColumnKind;
use crate::utils::feature_columns;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::debug;

/// Outcome of the neighbor-count search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Neighbor count for the final model.
    pub k: usize,
    /// 1-indexed grid position of the best candidate in each repetition.
    pub winning_positions: Vec<usize>,
}

/// Repeated random-split search over a grid of neighbor counts.
pub struct NeighborModelSelector {
    grid: Vec<usize>,
    repetitions: usize,
    test_fraction: f64,
    selection: KSelection,
    parallel: bool,
}

impl NeighborModelSelector {
    pub fn new(config: &ImputerConfig) -> Self {
        Self {
            grid: config.k_grid.clone(),
            repetitions: config.cv_repetitions,
            test_fraction: config.test_fraction,
            selection: config.k_selection,
            parallel: config.parallel_search,
        }
    }

    /// Choose a neighbor count for `target` from the fully-observed `pool`.
    ///
    /// Permutations are drawn from `rng` up front, in repetition order, so the
    /// result depends only on the RNG state and not on how the repetitions are
    /// scheduled.
    pub fn select<R: Rng + ?Sized>(
        &self,
        pool: &DataFrame,
        target: &str,
        kind: ColumnKind,
        excluded: &[String],
        rng: &mut R,
    ) -> Result<Selection> {
        let mut skip: Vec<&str> = excluded.iter().map(String::as_str).collect();
        skip.push(target);
        let features = feature_columns(pool, &skip);
        let (x, y) = training_data(pool, target, &features)?;

        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(ImputationError::degenerate(
                target,
                "fully-observed pool is empty",
            ));
        }

        let test_size = (self.test_fraction * n_rows as f64).floor() as usize;
        if test_size == 0 {
            return Err(ImputationError::degenerate(
                target,
                format!(
                    "{} fully-observed rows leave an empty test split at fraction {}",
                    n_rows, self.test_fraction
                ),
            ));
        }

        if kind == ColumnKind::Categorical {
            ensure_multiple_classes(target, &y)?;
        }

        let permutations: Vec<Vec<usize>> = (0..self.repetitions)
            .map(|_| {
                let mut order: Vec<usize> = (0..n_rows).collect();
                order.shuffle(rng);
                order
            })
            .collect();

        let evaluate =
            |order: &Vec<usize>| self.best_position(target, kind, &x, &y, order, test_size);

        let winning_positions: Vec<usize> = if self.parallel {
            permutations
                .par_iter()
                .map(evaluate)
                .collect::<Result<Vec<_>>>()?
        } else {
            permutations
                .iter()
                .map(evaluate)
                .collect::<Result<Vec<_>>>()?
        };

        let k = self.aggregate(&winning_positions);
        debug!(
            "Selected k={} for '{}' ({:?}, winners at positions {:?})",
            k, target, self.selection, winning_positions
        );

        Ok(Selection {
            k,
            winning_positions,
        })
    }

    /// 1-indexed grid position of the best-scoring candidate on one split.
    fn best_position(
        &self,
        target: &str,
        kind: ColumnKind,
        x: &Array2<f64>,
        y: &Array1<f64>,
        order: &[usize],
        test_size: usize,
    ) -> Result<usize> {
        let (test_rows, train_rows) = order.split_at(test_size);

        let model = NeighborModel::fit(
            kind,
            x.select(Axis(0), train_rows),
            y.select(Axis(0), train_rows),
        )
        .map_err(|e| ImputationError::model_fit(target, e.to_string()))?;

        let y_test = y.select(Axis(0), test_rows);
        let predictions = model
            .predict_grid(&x.select(Axis(0), test_rows), &self.grid)
            .map_err(|e| ImputationError::model_fit(target, e.to_string()))?;

        let mut best_slot = 0;
        let mut best_score = score(kind, &predictions[0], &y_test);
        for (slot, preds) in predictions.iter().enumerate().skip(1) {
            let candidate = score(kind, preds, &y_test);
            let better = match kind {
                ColumnKind::Continuous => candidate < best_score,
                ColumnKind::Categorical => candidate > best_score,
            };
            if better {
                best_slot = slot;
                best_score = candidate;
            }
        }

        Ok(best_slot + 1)
    }

    /// Truncated mean of the winners, read as positions or as k values.
    fn aggregate(&self, winning_positions: &[usize]) -> usize {
        let total: usize = match self.selection {
            KSelection::GridPosition => winning_positions.iter().sum(),
            KSelection::GridValue => winning_positions
                .iter()
                .map(|&pos| self.grid[pos - 1])
                .sum(),
        };
        total / winning_positions.len()
    }
}

/// Mean squared error for regression, accuracy for classification.
fn score(kind: ColumnKind, predictions: &Array1<f64>, truth: &Array1<f64>) -> f64 {
    let n = truth.len() as f64;
    match kind {
        ColumnKind::Continuous => {
            predictions
                .iter()
                .zip(truth.iter())
                .map(|(p, t)| (p - t) * (p - t))
                .sum::<f64>()
                / n
        }
        ColumnKind::Categorical => {
            let hits = predictions
                .iter()
                .zip(truth.iter())
                .filter(|(p, t)| p.round() as i64 == t.round() as i64)
                .count();
            hits as f64 / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(selection: KSelection, parallel: bool) -> ImputerConfig {
        ImputerConfig::builder()
            .k_selection(selection)
            .parallel_search(parallel)
            .build()
            .unwrap()
    }

    fn linear_pool(n: usize) -> DataFrame {
        let sqft: Vec<f64> = (0..n).map(|i| 400.0 + 50.0 * i as f64).collect();
        let bedrooms: Vec<f64> = (0..n).map(|i| 1.0 + (i / 4) as f64).collect();
        df![
            "sqft" => sqft,
            "bedrooms" => bedrooms,
        ]
        .unwrap()
    }

    #[test]
    fn test_score_mse_and_accuracy() {
        let preds = array![1.0, 2.0, 4.0];
        let truth = array![1.0, 2.0, 2.0];
        assert!((score(ColumnKind::Continuous, &preds, &truth) - 4.0 / 3.0).abs() < 1e-12);
        assert!((score(ColumnKind::Categorical, &preds, &truth) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_position_versus_value() {
        let by_position = NeighborModelSelector::new(&config(KSelection::GridPosition, false));
        let by_value = NeighborModelSelector::new(&config(KSelection::GridValue, false));

        // positions 2 and 3 -> values 3 and 5
        assert_eq!(by_position.aggregate(&[2, 3]), 2);
        assert_eq!(by_value.aggregate(&[2, 3]), 4);
        assert_eq!(by_position.aggregate(&[1, 1, 2]), 1);
    }

    #[test]
    fn test_select_is_deterministic_for_fixed_seed() {
        let pool = linear_pool(30);
        let selector = NeighborModelSelector::new(&config(KSelection::GridPosition, false));

        let first = selector
            .select(&pool, "bedrooms", ColumnKind::Continuous, &[], &mut StdRng::seed_from_u64(11))
            .unwrap();
        let second = selector
            .select(&pool, "bedrooms", ColumnKind::Continuous, &[], &mut StdRng::seed_from_u64(11))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.winning_positions.len(), 10);
        assert!(first.winning_positions.iter().all(|&p| (1..=7).contains(&p)));
        assert!((1..=7).contains(&first.k));
    }

    #[test]
    fn test_parallel_and_sequential_search_agree() {
        let pool = linear_pool(40);
        let sequential = NeighborModelSelector::new(&config(KSelection::GridValue, false))
            .select(&pool, "bedrooms", ColumnKind::Continuous, &[], &mut StdRng::seed_from_u64(3))
            .unwrap();
        let parallel = NeighborModelSelector::new(&config(KSelection::GridValue, true))
            .select(&pool, "bedrooms", ColumnKind::Continuous, &[], &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_select_rejects_pool_too_small_for_test_split() {
        let pool = linear_pool(3);
        let selector = NeighborModelSelector::new(&ImputerConfig::default());
        let result = selector.select(
            &pool,
            "bedrooms",
            ColumnKind::Continuous,
            &[],
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            result,
            Err(ImputationError::DegenerateTraining { .. })
        ));
    }

    #[test]
    fn test_select_rejects_single_class_target() {
        let pool = df![
            "sqft" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "property_type" => [1i64, 1, 1, 1, 1, 1],
        ]
        .unwrap();
        let selector = NeighborModelSelector::new(&ImputerConfig::default());
        let result = selector.select(
            &pool,
            "property_type",
            ColumnKind::Categorical,
            &[],
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(ImputationError::ModelFit { .. })));
    }

    #[test]
    fn test_perfectly_separated_classes_prefer_small_k() {
        // Two tight clusters of three rows: with k=1 every held-out row is
        // classified correctly, larger k starts pulling in the other cluster.
        let pool = df![
            "x" => [0.0, 0.1, 0.2, 10.0, 10.1, 10.2, 0.05, 10.05, 0.15, 10.15],
            "label" => [0i64, 0, 0, 1, 1, 1, 0, 1, 0, 1],
        ]
        .unwrap();
        let selector = NeighborModelSelector::new(
            &ImputerConfig::builder()
                .k_grid(vec![1, 13])
                .parallel_search(false)
                .build()
                .unwrap(),
        );

        let selection = selector
            .select(&pool, "label", ColumnKind::Categorical, &[], &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert!(selection.winning_positions.iter().all(|&p| p == 1));
        assert_eq!(selection.k, 1);
    }
}
