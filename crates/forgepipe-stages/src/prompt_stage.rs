//! The common case: assemble a message list from the stage's inputs, make
//! one Model Router call against a configured role, and persist its raw
//! response as a single named artifact.

use std::time::Duration;

use async_trait::async_trait;
use forgepipe_core::stage::StageKey;
use forgepipe_providers::Message;
use forgepipe_router::{RouteContext, RouteRequest};

use crate::context::{StageContext, StageInputs};
use crate::error::StageError;
use crate::handler::StageHandler;

/// A function that turns a stage's inputs into the message list sent to the
/// Model Router. Kept as a plain function pointer (not a closure) so stage
/// table construction stays a flat, inspectable list rather than a pile of
/// captured state.
pub type PromptBuilder = fn(&StageInputs) -> Vec<Message>;

pub struct PromptStage {
    pub role: &'static str,
    pub output_artifact: &'static str,
    pub timeout: Duration,
    pub build_messages: PromptBuilder,
}

impl PromptStage {
    #[must_use]
    pub const fn new(
        role: &'static str,
        output_artifact: &'static str,
        timeout: Duration,
        build_messages: PromptBuilder,
    ) -> Self {
        Self {
            role,
            output_artifact,
            timeout,
            build_messages,
        }
    }
}

#[async_trait]
impl StageHandler for PromptStage {
    async fn run(
        &self,
        ctx: &StageContext,
        _stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        let messages = (self.build_messages)(inputs);
        let request = RouteRequest::for_role(self.role, messages, self.timeout);
        let route_ctx = RouteContext {
            build_id: ctx.build_id,
            tenant: ctx.tenant.clone(),
            user: ctx.user.clone(),
            project: ctx.project.clone(),
        };

        let response = ctx.router.route(&route_ctx, request).await?;
        Ok(vec![(
            self.output_artifact.to_string(),
            response.raw_response.into_bytes(),
        )])
    }
}
