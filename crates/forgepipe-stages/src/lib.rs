//! Stage handlers and the default stage table: the layer that turns a pipeline
//! stage into one or more Model Router calls (or, for the final three stages,
//! a call to an external collaborator).

mod code_generation;
mod collaborators;
mod context;
mod error;
mod handler;
mod non_ai_stages;
mod prompt_stage;
mod table;

pub use code_generation::CodeGenerationStage;
pub use collaborators::{CloudDeployer, RepoHoster, StaticCollaborator};
pub use context::{StageContext, StageInputs};
pub use error::StageError;
pub use handler::StageHandler;
pub use non_ai_stages::{CloudDeploymentStage, FinalizationStage, RepoPublicationStage};
pub use prompt_stage::{PromptBuilder, PromptStage};
pub use table::{default_stage_table, StageEntry};
