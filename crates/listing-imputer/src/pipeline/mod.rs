//! Pipeline module.
//!
//! The orchestrator and the row-level stages it drives.

mod orchestrator;
pub mod partition;
pub mod progress;
pub mod rounder;

pub use orchestrator::{ImputationOrchestrator, ImputationOrchestratorBuilder};
pub use partition::{MissingnessPartitioner, Partition};
pub use progress::{ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate};
pub use rounder::Rounder;
