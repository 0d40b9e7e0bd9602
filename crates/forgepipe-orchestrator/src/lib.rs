//! The Pipeline Orchestrator: drives each build's stages through the Stage
//! Router, persisting artifacts and emitting Progress Bus events along the
//! way, per §4.I of the design.

mod error;
mod executor;
mod pipeline;
mod registry;

pub use error::OrchestratorError;
pub use executor::StageOutcome;
pub use pipeline::{Orchestrator, StageEntry};
