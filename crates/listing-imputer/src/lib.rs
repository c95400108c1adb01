//! Listing Imputer
//!
//! Cross-validated nearest-neighbor imputation for tabular real-estate
//! listing data, built on Polars.
//!
//! # Overview
//!
//! - **Categorical Encoding**: every non-numeric column gets a dense, sorted
//!   integer code space; the code -> label table is kept
//! - **Missingness Partition**: rows split once into a fixed training pool
//!   and a missing-row frame
//! - **Placeholder Filling**: medians stand in for the other pending columns
//!   while one column is predicted
//! - **Neighbor Count Search**: repeated random splits choose k per column
//! - **Neighbor Imputation**: regressor for continuous columns, majority vote
//!   for categorical ones
//! - **Rounding**: imputed columns end up integral
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use listing_imputer::{ColumnKind, ImputationOrchestrator, ImputationSchema, ImputerConfig};
//!
//! let df = listing_imputer::io::read_csv("listings.csv")?;
//!
//! let schema = ImputationSchema::new(["bedrooms", "bathrooms", "property_type"])
//!     .with_kind("property_type", ColumnKind::Categorical)
//!     .with_target("price");
//!
//! let mut outcome = ImputationOrchestrator::builder()
//!     .config(ImputerConfig::builder().random_seed(42).build()?)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&df, &schema)?;
//!
//! listing_imputer::io::write_csv(&mut outcome.data, "listings_imputed.csv")?;
//! println!("{}", outcome.report.to_json()?);
//! ```
//!
//! # Neighbor count selection
//!
//! Each cross-validation repetition records the 1-indexed grid position of
//! the best candidate. [`KSelection::GridPosition`] (the default) averages
//! those positions and uses the result directly as k, reproducing the
//! historical listing pipeline. [`KSelection::GridValue`] averages the
//! winning k values instead.

pub mod config;
pub mod encoder;
pub mod error;
pub mod imputers;
pub mod io;
pub mod pipeline;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, DEFAULT_K_GRID, ImputerConfig, ImputerConfigBuilder, KSelection,
    RoundingMode,
};
pub use encoder::{CategoricalEncoder, EncodedColumn, EncodingTable};
pub use error::{ImputationError, Result as ImputationResult, ResultExt};
pub use imputers::{
    ModelError, NeighborImputer, NeighborModel, NeighborModelSelector, PlaceholderFill,
    PlaceholderFiller, Predictions, Selection,
};
pub use pipeline::{
    ClosureProgressReporter, ImputationOrchestrator, ImputationOrchestratorBuilder,
    ImputationStage, MissingnessPartitioner, Partition, ProgressReporter, ProgressUpdate, Rounder,
};
pub use schema::ImputationSchema;
pub use types::{ColumnImputationSummary, ColumnKind, ImputationOutcome, ImputationReport};
