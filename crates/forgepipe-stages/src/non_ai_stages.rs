//! Stage handlers that don't call the Model Router: repo publication, cloud
//! deployment, and build finalization.

use std::sync::Arc;

use async_trait::async_trait;
use forgepipe_core::stage::StageKey;

use crate::collaborators::{CloudDeployer, RepoHoster};
use crate::context::{StageContext, StageInputs};
use crate::error::StageError;
use crate::handler::StageHandler;

pub struct RepoPublicationStage {
    pub hoster: Arc<dyn RepoHoster>,
    pub code_artifact: &'static str,
    pub output_artifact: &'static str,
}

#[async_trait]
impl StageHandler for RepoPublicationStage {
    async fn run(
        &self,
        ctx: &StageContext,
        _stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        let code = inputs
            .artifacts
            .get(self.code_artifact)
            .ok_or_else(|| StageError::NoOutput(self.code_artifact.to_string()))?;

        let descriptor = self
            .hoster
            .publish(ctx.build_id, code)
            .await
            .map_err(|message| StageError::Collaborator {
                collaborator: "repo hoster",
                message,
            })?;

        Ok(vec![(self.output_artifact.to_string(), descriptor.into_bytes())])
    }
}

pub struct CloudDeploymentStage {
    pub deployer: Arc<dyn CloudDeployer>,
    pub repo_descriptor_artifact: &'static str,
    pub output_artifact: &'static str,
}

#[async_trait]
impl StageHandler for CloudDeploymentStage {
    async fn run(
        &self,
        ctx: &StageContext,
        _stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        let descriptor = inputs
            .text(self.repo_descriptor_artifact)
            .ok_or_else(|| StageError::NoOutput(self.repo_descriptor_artifact.to_string()))?;

        let deployed = self
            .deployer
            .deploy(ctx.build_id, &descriptor)
            .await
            .map_err(|message| StageError::Collaborator {
                collaborator: "cloud deployer",
                message,
            })?;

        Ok(vec![(self.output_artifact.to_string(), deployed.into_bytes())])
    }
}

/// The final stage: no external call, just a summary artifact bundling the
/// descriptors produced by earlier stages for the client's closing snapshot.
pub struct FinalizationStage {
    pub summarize: &'static [&'static str],
    pub output_artifact: &'static str,
}

#[async_trait]
impl StageHandler for FinalizationStage {
    async fn run(
        &self,
        _ctx: &StageContext,
        _stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        let mut summary = serde_json::Map::new();
        for name in self.summarize {
            if let Some(text) = inputs.text(name) {
                summary.insert((*name).to_string(), serde_json::Value::String(text));
            }
        }
        let bytes = serde_json::to_vec(&serde_json::Value::Object(summary))
            .expect("summary map is always serializable");
        Ok(vec![(self.output_artifact.to_string(), bytes)])
    }
}
