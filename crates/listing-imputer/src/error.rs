//! Error types for the imputation engine.
//!
//! Every variant is fatal for the run that raised it: the engine never
//! returns a partially imputed dataset. Errors are serializable so they can
//! be forwarded to whatever process drives the batch job.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the imputation engine.
#[derive(Error, Debug)]
pub enum ImputationError {
    /// The dataset does not match the declared schema.
    #[error("Schema error in column '{column}': {reason}")]
    Schema { column: String, reason: String },

    /// The fully-observed pool cannot support cross-validation or fitting.
    #[error("Degenerate training pool for column '{column}': {reason}")]
    DegenerateTraining { column: String, reason: String },

    /// The neighbor model could not be fitted.
    #[error("Failed to fit model for column '{column}': {reason}")]
    ModelFit { column: String, reason: String },

    /// Feature columns differ between the training pool and a prediction frame.
    #[error("Dimension mismatch: expected features {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImputationError>,
    },
}

impl ImputationError {
    pub(crate) fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DegenerateTraining {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_fit(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelFit {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ImputationError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, preserved through context wrapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::DegenerateTraining { .. } => "DEGENERATE_TRAINING",
            Self::ModelFit { .. } => "MODEL_FIT_ERROR",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, skipping any context layers.
    pub fn root(&self) -> &ImputationError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ImputationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ImputationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for imputation operations.
pub type Result<T> = std::result::Result<T, ImputationError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ImputationError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ImputationError::schema("bedrooms", "absent").error_code(),
            "SCHEMA_ERROR"
        );
        assert_eq!(
            ImputationError::model_fit("property_type", "one class").error_code(),
            "MODEL_FIT_ERROR"
        );
        assert_eq!(
            ImputationError::DimensionMismatch {
                expected: vec!["a".into()],
                found: vec!["b".into()],
            }
            .error_code(),
            "DIMENSION_MISMATCH"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = ImputationError::degenerate("bathrooms", "pool is empty");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DEGENERATE_TRAINING"));
        assert!(json.contains("bathrooms"));
    }

    #[test]
    fn test_with_context_preserves_code_and_root() {
        let error = ImputationError::ColumnNotFound("beds".to_string())
            .with_context("While imputing 'beds'");
        assert!(error.to_string().contains("While imputing"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
        assert!(matches!(error.root(), ImputationError::ColumnNotFound(_)));
    }
}
