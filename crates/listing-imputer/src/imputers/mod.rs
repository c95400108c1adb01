//! Imputation building blocks.
//!
//! - Median placeholders for non-target columns
//! - Cross-validated neighbor-count selection
//! - Neighbor regression / classification for one target column

mod knn;
mod selection;
mod statistical;

pub use knn::{ModelError, NeighborImputer, NeighborModel, Predictions};
pub use selection::{NeighborModelSelector, Selection};
pub use statistical::{PlaceholderFill, PlaceholderFiller};
