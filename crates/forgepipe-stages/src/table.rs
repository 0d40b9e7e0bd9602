//! The default stage table: one entry per well-known stage key, pairing a
//! [`StageDescriptor`] with the [`StageHandler`] that runs it.

use std::sync::Arc;
use std::time::Duration;

use forgepipe_core::stage::{well_known, StageDescriptor};
use forgepipe_providers::Message;

use crate::code_generation::CodeGenerationStage;
use crate::collaborators::{CloudDeployer, RepoHoster};
use crate::context::StageInputs;
use crate::handler::StageHandler;
use crate::non_ai_stages::{CloudDeploymentStage, FinalizationStage, RepoPublicationStage};
use crate::prompt_stage::PromptStage;

/// Call-level timeout handed to the Model Router; shorter than the stage's
/// own wall-clock timeout (see [`forgepipe_config::model::OrchestratorConfig`]),
/// per the timeout model in the concurrency design.
const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct StageEntry {
    pub descriptor: StageDescriptor,
    pub handler: Arc<dyn StageHandler>,
}

fn clarification_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system(
            "You are the clarification stage of an application build pipeline. \
             Resolve ambiguity in the submitted project spec and restate it precisely.",
        ),
        Message::user(inputs.original_spec.to_string()),
    ]
}

fn normalization_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Normalize the clarified spec into the pipeline's canonical shape."),
        Message::user(inputs.text("clarified_spec.json").unwrap_or_default()),
    ]
}

fn refinement_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Refine the normalized spec: fill gaps, resolve contradictions."),
        Message::user(inputs.text("normalized_spec.json").unwrap_or_default()),
    ]
}

fn documentation_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Write end-user and developer documentation for this application spec."),
        Message::user(inputs.text("refined_spec.json").unwrap_or_default()),
    ]
}

fn schema_generation_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Produce the data schema (entities, fields, relations) for this spec."),
        Message::user(inputs.text("refined_spec.json").unwrap_or_default()),
    ]
}

fn structural_validation_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Validate this schema for internal consistency; report any problems found."),
        Message::user(inputs.text("schema.json").unwrap_or_default()),
    ]
}

fn file_structure_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Plan the repository's file and directory structure for this schema."),
        Message::user(inputs.text("schema.json").unwrap_or_default()),
    ]
}

fn scaffolding_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("List every file from this structure plan that should exist as an empty placeholder."),
        Message::user(inputs.text("file_structure.json").unwrap_or_default()),
    ]
}

fn code_generation_prompt_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Break the file structure and scaffold manifest into a per-file generation plan."),
        Message::user(inputs.text("file_structure.json").unwrap_or_default()),
    ]
}

fn code_generation_code_messages(inputs: &StageInputs) -> Vec<Message> {
    vec![
        Message::system("Generate the application source code for this scaffold."),
        Message::user(inputs.text("scaffold_manifest.json").unwrap_or_default()),
    ]
}

/// Build the pipeline's default stage table, in ascending `StageKey` order.
/// `hoster` and `deployer` are the external collaborators stages 7 and 8
/// call through.
#[must_use]
pub fn default_stage_table(
    hoster: Arc<dyn RepoHoster>,
    deployer: Arc<dyn CloudDeployer>,
) -> Vec<StageEntry> {
    vec![
        StageEntry {
            descriptor: StageDescriptor::new(well_known::CLARIFICATION, "clarification")
                .with_outputs(["clarified_spec.json"]),
            handler: Arc::new(PromptStage::new(
                "clarifier",
                "clarified_spec.json",
                PROVIDER_CALL_TIMEOUT,
                clarification_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::NORMALIZATION, "normalization")
                .with_inputs(["clarified_spec.json"])
                .with_outputs(["normalized_spec.json"]),
            handler: Arc::new(PromptStage::new(
                "normalizer",
                "normalized_spec.json",
                PROVIDER_CALL_TIMEOUT,
                normalization_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::REFINEMENT, "refinement")
                .with_inputs(["normalized_spec.json"])
                .with_outputs(["refined_spec.json"]),
            handler: Arc::new(PromptStage::new(
                "refiner",
                "refined_spec.json",
                PROVIDER_CALL_TIMEOUT,
                refinement_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::DOCUMENTATION, "documentation")
                .with_inputs(["refined_spec.json"])
                .with_outputs(["docs_overview.md"]),
            handler: Arc::new(PromptStage::new(
                "doc-writer",
                "docs_overview.md",
                PROVIDER_CALL_TIMEOUT,
                documentation_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::SCHEMA_GENERATION, "schema_generation")
                .with_inputs(["refined_spec.json"])
                .with_outputs(["schema.json"]),
            handler: Arc::new(PromptStage::new(
                "schema-generator",
                "schema.json",
                PROVIDER_CALL_TIMEOUT,
                schema_generation_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::STRUCTURAL_VALIDATION, "structural_validation")
                .with_inputs(["schema.json"])
                .with_outputs(["validation_report.json"]),
            handler: Arc::new(PromptStage::new(
                "structural-validator",
                "validation_report.json",
                PROVIDER_CALL_TIMEOUT,
                structural_validation_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::FILE_STRUCTURE_PLANNING, "file_structure_planning")
                .with_inputs(["schema.json", "validation_report.json"])
                .with_outputs(["file_structure.json"]),
            handler: Arc::new(PromptStage::new(
                "file-planner",
                "file_structure.json",
                PROVIDER_CALL_TIMEOUT,
                file_structure_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::EMPTY_FILE_SCAFFOLDING, "empty_file_scaffolding")
                .with_inputs(["file_structure.json"])
                .with_outputs(["scaffold_manifest.json"]),
            handler: Arc::new(PromptStage::new(
                "scaffolder",
                "scaffold_manifest.json",
                PROVIDER_CALL_TIMEOUT,
                scaffolding_messages,
            )),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::CODE_GENERATION, "code_generation")
                .with_inputs(["file_structure.json", "scaffold_manifest.json"])
                .with_outputs(["code_gen_plan.json", "main.rs"]),
            handler: Arc::new(CodeGenerationStage {
                prompt_builder_output: "code_gen_plan.json",
                code_generator_output: "main.rs",
                timeout: PROVIDER_CALL_TIMEOUT,
                build_prompt_messages: code_generation_prompt_messages,
                build_code_messages: code_generation_code_messages,
            }),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::REPO_PUBLICATION, "repo_publication")
                .with_inputs(["main.rs"])
                .with_outputs(["repo_descriptor.txt"])
                .ai_required(false),
            handler: Arc::new(RepoPublicationStage {
                hoster,
                code_artifact: "main.rs",
                output_artifact: "repo_descriptor.txt",
            }),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::CLOUD_DEPLOYMENT, "cloud_deployment")
                .with_inputs(["repo_descriptor.txt"])
                .with_outputs(["deployment_descriptor.txt"])
                .ai_required(false),
            handler: Arc::new(CloudDeploymentStage {
                deployer,
                repo_descriptor_artifact: "repo_descriptor.txt",
                output_artifact: "deployment_descriptor.txt",
            }),
        },
        StageEntry {
            descriptor: StageDescriptor::new(well_known::FINALIZATION, "finalization")
                .with_inputs(["repo_descriptor.txt", "deployment_descriptor.txt"])
                .with_outputs(["build_summary.json"])
                .ai_required(false),
            handler: Arc::new(FinalizationStage {
                summarize: &["repo_descriptor.txt", "deployment_descriptor.txt"],
                output_artifact: "build_summary.json",
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StaticCollaborator;

    #[test]
    fn default_table_is_sorted_by_stage_key() {
        let table = default_stage_table(
            Arc::new(StaticCollaborator { descriptor: "repo".to_string() }),
            Arc::new(StaticCollaborator { descriptor: "deploy".to_string() }),
        );
        for pair in table.windows(2) {
            assert!(pair[0].descriptor.key < pair[1].descriptor.key);
        }
        assert_eq!(table.len(), 12);
    }
}
