//! Imputation orchestrator.
//!
//! Drives one run over the MissingSet: encode, partition once, then for each
//! column in registration order fill placeholders, pick k, predict, and write
//! the predictions into the persistent missing-row frame. Finally merge back
//! into input order and round.

use crate::config::{ConfigValidationError, ImputerConfig};
use crate::encoder::CategoricalEncoder;
use crate::error::{ImputationError, Result, ResultExt};
use crate::imputers::{NeighborImputer, NeighborModelSelector, PlaceholderFiller, Predictions};
use crate::pipeline::partition::{MissingnessPartitioner, Partition};
use crate::pipeline::progress::{
    ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate,
};
use crate::pipeline::rounder::Rounder;
use crate::schema::ImputationSchema;
use crate::types::{ColumnImputationSummary, ColumnKind, ImputationOutcome, ImputationReport};
use crate::utils::{column_values, missing_count};
use chrono::Local;
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs the cross-validated neighbor imputation over a listing frame.
///
/// # Example
///
/// ```rust,ignore
/// use listing_imputer::{ImputationOrchestrator, ImputationSchema, ImputerConfig};
///
/// let schema = ImputationSchema::new(["bedrooms", "property_type"]).with_target("price");
///
/// let outcome = ImputationOrchestrator::builder()
///     .config(ImputerConfig::builder().random_seed(7).build()?)
///     .on_progress(|update| println!("{}", update.message))
///     .build()?
///     .run(&df, &schema)?;
///
/// let labelled = outcome.encoding.decode_frame(&outcome.data)?;
/// ```
pub struct ImputationOrchestrator {
    config: ImputerConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(ImputationOrchestrator: Send);

/// State threaded through the per-column loop.
///
/// The pool is fixed at partition time; only `missing` accumulates
/// predictions.
struct ImputationState {
    remaining: VecDeque<(String, ColumnKind)>,
    missing: DataFrame,
    pool: DataFrame,
}

impl ImputationState {
    /// Columns still waiting for their turn, the current one included.
    fn pending_columns(&self) -> Vec<String> {
        self.remaining.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Write predictions for `target` into the persistent missing-row frame.
    fn write_predictions(&mut self, target: &str, predictions: &Predictions) -> Result<()> {
        let mut values = column_values(&self.missing, target)?;
        for (&row, &value) in predictions.rows.iter().zip(predictions.values.iter()) {
            values[row] = Some(value);
        }
        self.missing
            .replace(target, Series::new(target.into(), values))?;
        Ok(())
    }
}

impl ImputationOrchestrator {
    pub fn builder() -> ImputationOrchestratorBuilder {
        ImputationOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &ImputerConfig {
        &self.config
    }

    /// Impute every MissingSet column of `df`.
    ///
    /// The run either fills all MissingSet columns or fails as a whole; no
    /// partially imputed frame is ever returned.
    pub fn run(&self, df: &DataFrame, schema: &ImputationSchema) -> Result<ImputationOutcome> {
        match self.run_internal(df, schema) {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Imputed {} values across {} columns",
                    outcome.report.total_imputed(),
                    outcome.report.columns.len()
                )));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Imputation error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn run_internal(&self, df: &DataFrame, schema: &ImputationSchema) -> Result<ImputationOutcome> {
        let start_time = Instant::now();
        let started_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        self.config.validate()?;

        // Step 1: Schema + encoding
        info!("Validating schema and encoding categorical columns...");
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Encoding,
            0.0,
            "Encoding categorical columns...",
        ));

        let columns = schema.resolve(df)?;
        let missing_set: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let excluded = schema.excluded_columns();

        let (encoded, encoding) = CategoricalEncoder::fit_transform(df, &excluded)?;
        schema.check_complete_features(&encoded)?;
        info!(
            "Encoded {} categorical columns",
            encoding.encoded_columns().len()
        );

        let mut missing_before = Vec::with_capacity(columns.len());
        for name in &missing_set {
            missing_before.push(missing_count(&encoded, name)?);
        }

        // Step 2: Partition once
        info!("Partitioning rows by missingness...");
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Partitioning,
            0.0,
            "Partitioning rows...",
        ));

        let Partition { observed, missing } = MissingnessPartitioner::split(&encoded, &missing_set)?;
        info!(
            "{} fully-observed rows form the training pool, {} rows have gaps",
            observed.height(),
            missing.height()
        );
        let observed_rows = observed.height();
        let missing_rows = missing.height();

        let mut state = ImputationState {
            remaining: columns.iter().cloned().collect(),
            missing,
            pool: observed,
        };

        // Step 3: Per-column imputation, strictly in registration order
        let selector = NeighborModelSelector::new(&self.config);
        let mut rng = self.rng();
        let total = columns.len();
        let mut summaries = Vec::with_capacity(total);

        while let Some((target, kind)) = state.remaining.front().cloned() {
            let position = total - state.remaining.len();
            self.report_progress(ProgressUpdate::with_items(
                ImputationStage::Imputation,
                target.as_str(),
                position,
                total,
                format!("Imputing '{}' ({})", target, kind),
            ));

            let summary = self
                .impute_column(&mut state, &target, kind, &excluded, &selector, &mut rng)
                .context(format!("While imputing '{}'", target))?;

            summaries.push(ColumnImputationSummary {
                missing_before: missing_before[position],
                ..summary
            });
            state.remaining.pop_front();
        }

        // Step 4: Merge back and round
        info!("Merging imputed rows and rounding...");
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Rounding,
            0.0,
            "Rounding imputed columns...",
        ));

        let partition = Partition {
            observed: state.pool,
            missing: state.missing,
        };
        let merged = MissingnessPartitioner::merge(&encoded, &partition, &missing_set)?;
        let rounded = Rounder::round(&merged, &missing_set, self.config.rounding_mode)?;
        let data = restore_integer_dtypes(rounded, &encoded, &missing_set)?;

        let report = ImputationReport {
            started_at,
            duration_ms: start_time.elapsed().as_millis() as u64,
            total_rows: data.height(),
            observed_rows,
            missing_rows,
            encoded_columns: encoding.encoded_columns(),
            columns: summaries,
        };

        info!(
            "Imputation complete: {} values in {} columns ({} ms)",
            report.total_imputed(),
            report.columns.len(),
            report.duration_ms
        );

        Ok(ImputationOutcome {
            data,
            encoding,
            report,
        })
    }

    fn impute_column(
        &self,
        state: &mut ImputationState,
        target: &str,
        kind: ColumnKind,
        excluded: &[String],
        selector: &NeighborModelSelector,
        rng: &mut StdRng,
    ) -> Result<ColumnImputationSummary> {
        let fill =
            PlaceholderFiller::fill(&state.missing, target, &state.pending_columns(), &state.pool)?;

        let selection = selector.select(&state.pool, target, kind, excluded, rng)?;
        let imputer = NeighborImputer::fit(&state.pool, target, kind, excluded)?;
        let predictions = imputer.predict_missing(&fill.frame, selection.k)?;

        debug!(
            "'{}': k={}, {} predictions, placeholders in {:?}",
            target,
            selection.k,
            predictions.len(),
            fill.filled_columns
        );

        state.write_predictions(target, &predictions)?;

        Ok(ColumnImputationSummary {
            column: target.to_string(),
            kind,
            missing_before: 0,
            imputed: predictions.len(),
            chosen_k: selection.k,
            winning_positions: selection.winning_positions,
            placeholder_columns: fill.filled_columns,
        })
    }
}

/// Cast rebuilt columns back to the integer dtype they had after encoding.
fn restore_integer_dtypes(
    mut df: DataFrame,
    reference: &DataFrame,
    columns: &[String],
) -> Result<DataFrame> {
    for name in columns {
        let dtype = reference.column(name)?.dtype().clone();
        if dtype.is_integer() {
            let restored = df
                .column(name)?
                .as_materialized_series()
                .strict_cast(&dtype)
                .map_err(|e| {
                    ImputationError::schema(
                        name.as_str(),
                        format!("imputed values do not fit {:?}: {}", dtype, e),
                    )
                })?;
            df.replace(name, restored)?;
        }
    }
    Ok(df)
}

/// Builder for [`ImputationOrchestrator`].
#[derive(Default)]
pub struct ImputationOrchestratorBuilder {
    config: Option<ImputerConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(ImputationOrchestratorBuilder: Send);

impl ImputationOrchestratorBuilder {
    pub fn config(mut self, config: ImputerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach a custom progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Attach a progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<ImputationOrchestrator, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(ImputationOrchestrator {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
