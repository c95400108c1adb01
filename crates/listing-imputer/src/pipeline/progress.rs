//! Progress reporting for imputation runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use listing_imputer::ImputationOrchestrator;
//!
//! let outcome = ImputationOrchestrator::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&df, &schema)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of an imputation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStage {
    /// Validating the schema and label-encoding categorical columns
    Encoding,
    /// Splitting rows into the training pool and the missing-row frame
    Partitioning,
    /// Per-column search, fit and prediction
    Imputation,
    /// Merging back into input order and rounding imputed columns
    Rounding,
    /// Run completed successfully
    Complete,
    /// Run aborted with an error
    Failed,
}

impl ImputationStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Encoding => "Encoding Categories",
            Self::Partitioning => "Partitioning Rows",
            Self::Imputation => "Imputing Values",
            Self::Rounding => "Rounding",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage (0.0 - 1.0).
    ///
    /// Non-terminal weights sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Encoding => 0.05,
            Self::Partitioning => 0.05,
            Self::Imputation => 0.85,
            Self::Rounding => 0.05,
            Self::Complete => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Encoding => 0.0,
            Self::Partitioning => 0.05,
            Self::Imputation => 0.10,
            Self::Rounding => 0.95,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ImputationStage,

    /// Column currently being imputed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: ImputationStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            column: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for the `current`-th of `total` columns.
    pub fn with_items(
        stage: ImputationStage,
        column: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            column: Some(column.into()),
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: ImputationStage::Complete,
            column: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: ImputationStage::Failed,
            column: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }
}

/// Receiver of progress updates.
///
/// Must be `Send + Sync`: the orchestrator may run on a worker thread while
/// the receiver lives elsewhere.
///
/// ```rust,ignore
/// struct LogReporter;
///
/// impl ProgressReporter for LogReporter {
///     fn report(&self, update: ProgressUpdate) {
///         tracing::info!("{}: {}", update.stage.display_name(), update.message);
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Called once per stage and once per imputed column. Keep it cheap.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
