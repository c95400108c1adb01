//! Configuration for the imputation engine.
//!
//! All tunables are passed explicitly through [`ImputerConfig`]; the engine
//! reads no environment or global state.

use serde::{Deserialize, Serialize};

/// Odd neighbor counts from 1 to 13 inclusive.
pub const DEFAULT_K_GRID: [usize; 7] = [1, 3, 5, 7, 9, 11, 13];

/// How the cross-validation winners are turned into a neighbor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KSelection {
    /// Average the 1-indexed grid positions of the per-repetition winners and
    /// use the truncated mean directly as k. Reproduces the historical
    /// behavior of the listing pipeline, where position and value were
    /// conflated.
    #[default]
    GridPosition,
    /// Average the winning k values themselves and truncate.
    GridValue,
}

/// Rounding rule applied to imputed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoundingMode {
    /// 2.5 -> 2, 3.5 -> 4
    #[default]
    HalfToEven,
    /// 2.5 -> 3, -2.5 -> -3
    HalfAwayFromZero,
}

impl RoundingMode {
    #[inline]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::HalfToEven => value.round_ties_even(),
            Self::HalfAwayFromZero => value.round(),
        }
    }
}

/// Configuration for an imputation run.
///
/// Use [`ImputerConfig::builder()`] for a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use listing_imputer::config::{ImputerConfig, KSelection};
///
/// let config = ImputerConfig::builder()
///     .k_selection(KSelection::GridValue)
///     .random_seed(42)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputerConfig {
    /// Candidate neighbor counts searched by cross-validation.
    /// Default: 1, 3, 5, 7, 9, 11, 13
    pub k_grid: Vec<usize>,

    /// Number of random train/test splits per target column.
    /// Default: 10
    pub cv_repetitions: usize,

    /// Share of the fully-observed rows held out as the test split (rounded down).
    /// Default: 0.3
    pub test_fraction: f64,

    /// Interpretation of the cross-validation winners.
    /// Default: GridPosition
    pub k_selection: KSelection,

    /// Rounding applied to imputed columns after the run.
    /// Default: HalfToEven
    pub rounding_mode: RoundingMode,

    /// Seed for the row shuffles. `None` draws a seed from the OS.
    /// Default: None
    pub random_seed: Option<u64>,

    /// Evaluate cross-validation repetitions on the rayon pool.
    /// Default: true
    pub parallel_search: bool,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            k_grid: DEFAULT_K_GRID.to_vec(),
            cv_repetitions: 10,
            test_fraction: 0.3,
            k_selection: KSelection::default(),
            rounding_mode: RoundingMode::default(),
            random_seed: None,
            parallel_search: true,
        }
    }
}

impl ImputerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ImputerConfigBuilder {
        ImputerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.k_grid.is_empty() {
            return Err(ConfigValidationError::EmptyGrid);
        }

        if let Some(&k) = self.k_grid.iter().find(|&&k| k == 0) {
            return Err(ConfigValidationError::InvalidNeighborCount(k));
        }

        if self.cv_repetitions == 0 {
            return Err(ConfigValidationError::InvalidRepetitions(
                self.cv_repetitions,
            ));
        }

        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigValidationError::InvalidTestFraction(
                self.test_fraction,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Neighbor grid must contain at least one candidate")]
    EmptyGrid,

    #[error("Invalid neighbor count in grid: {0} (must be at least 1)")]
    InvalidNeighborCount(usize),

    #[error("Invalid cross-validation repetitions: {0} (must be at least 1)")]
    InvalidRepetitions(usize),

    #[error("Invalid test fraction: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidTestFraction(f64),
}

impl From<ConfigValidationError> for crate::error::ImputationError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::ImputationError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`ImputerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ImputerConfigBuilder {
    k_grid: Option<Vec<usize>>,
    cv_repetitions: Option<usize>,
    test_fraction: Option<f64>,
    k_selection: Option<KSelection>,
    rounding_mode: Option<RoundingMode>,
    random_seed: Option<u64>,
    parallel_search: Option<bool>,
}

impl ImputerConfigBuilder {
    /// Set the candidate neighbor counts.
    pub fn k_grid(mut self, grid: impl Into<Vec<usize>>) -> Self {
        self.k_grid = Some(grid.into());
        self
    }

    /// Set how many random splits are drawn per target column.
    pub fn cv_repetitions(mut self, repetitions: usize) -> Self {
        self.cv_repetitions = Some(repetitions);
        self
    }

    /// Set the held-out share of each split.
    ///
    /// # Arguments
    /// * `fraction` - Value strictly between 0.0 and 1.0 (e.g., 0.3 = 30%)
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    /// Choose between position-based and value-based k selection.
    pub fn k_selection(mut self, selection: KSelection) -> Self {
        self.k_selection = Some(selection);
        self
    }

    pub fn rounding_mode(mut self, mode: RoundingMode) -> Self {
        self.rounding_mode = Some(mode);
        self
    }

    /// Fix the shuffle seed for reproducible runs.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Enable or disable parallel evaluation of cross-validation repetitions.
    pub fn parallel_search(mut self, parallel: bool) -> Self {
        self.parallel_search = Some(parallel);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ImputerConfig` or an error if validation fails.
    pub fn build(self) -> Result<ImputerConfig, ConfigValidationError> {
        let config = ImputerConfig {
            k_grid: self.k_grid.unwrap_or_else(|| DEFAULT_K_GRID.to_vec()),
            cv_repetitions: self.cv_repetitions.unwrap_or(10),
            test_fraction: self.test_fraction.unwrap_or(0.3),
            k_selection: self.k_selection.unwrap_or_default(),
            rounding_mode: self.rounding_mode.unwrap_or_default(),
            random_seed: self.random_seed,
            parallel_search: self.parallel_search.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
