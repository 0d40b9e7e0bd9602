//! The Code Generation stage: the one place in the pipeline where a single
//! stage issues more than one Model Router call. A `prompt-builder` role
//! call and a `code-generator` role call run concurrently; both must
//! succeed for the stage to succeed.

use std::time::Duration;

use async_trait::async_trait;
use forgepipe_core::stage::StageKey;
use forgepipe_providers::Message;
use forgepipe_router::{RouteContext, RouteRequest};

use crate::context::{StageContext, StageInputs};
use crate::error::StageError;
use crate::handler::StageHandler;
use crate::prompt_stage::PromptBuilder;

pub struct CodeGenerationStage {
    pub prompt_builder_output: &'static str,
    pub code_generator_output: &'static str,
    pub timeout: Duration,
    pub build_prompt_messages: PromptBuilder,
    pub build_code_messages: PromptBuilder,
}

#[async_trait]
impl StageHandler for CodeGenerationStage {
    async fn run(
        &self,
        ctx: &StageContext,
        _stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        let route_ctx = RouteContext {
            build_id: ctx.build_id,
            tenant: ctx.tenant.clone(),
            user: ctx.user.clone(),
            project: ctx.project.clone(),
        };

        let prompt_request = RouteRequest::for_role(
            "prompt-builder",
            (self.build_prompt_messages)(inputs),
            self.timeout,
        );
        let code_request = RouteRequest::for_role(
            "code-generator",
            (self.build_code_messages)(inputs),
            self.timeout,
        );

        let (prompt_result, code_result) = tokio::join!(
            ctx.router.route(&route_ctx, prompt_request),
            ctx.router.route(&route_ctx, code_request),
        );

        let prompt_response = prompt_result.map_err(|source| StageError::PartialCodeGeneration {
            which: "prompt-builder",
            source,
        })?;
        let code_response = code_result.map_err(|source| StageError::PartialCodeGeneration {
            which: "code-generator",
            source,
        })?;

        Ok(vec![
            (self.prompt_builder_output.to_string(), prompt_response.raw_response.into_bytes()),
            (self.code_generator_output.to_string(), code_response.raw_response.into_bytes()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forgepipe_cache::ResponseCache;
    use forgepipe_config::CostConfig;
    use forgepipe_cost::CostTracker;
    use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
    use forgepipe_cost::CostController;
    use forgepipe_providers::{MockBackend, ProviderError, ProviderRegistry, ScriptedOutcome};
    use forgepipe_ratelimit::RateLimiter;
    use forgepipe_router::{HealthTable, ModelRouter, PriceTable, RoleMap, RoleTarget};

    fn inputs() -> StageInputs {
        StageInputs {
            original_spec: serde_json::json!({}),
            artifacts: Default::default(),
        }
    }

    fn ctx_for(router: ModelRouter) -> StageContext {
        StageContext {
            build_id: BuildId::new(),
            tenant: TenantId::from("acme"),
            user: UserId::from("u1"),
            project: ProjectId::from("p1"),
            router: Arc::new(router),
        }
    }

    fn router_with(registry: ProviderRegistry, role_map: RoleMap) -> ModelRouter {
        ModelRouter::new(
            Arc::new(registry),
            Arc::new(ResponseCache::new(100, Duration::from_secs(60))),
            Arc::new(RateLimiter::new()),
            Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
            Arc::new(HealthTable::new()),
            PriceTable::new(),
            role_map,
            1,
        )
    }

    fn stage() -> CodeGenerationStage {
        CodeGenerationStage {
            prompt_builder_output: "code_gen_plan.json",
            code_generator_output: "main.rs",
            timeout: Duration::from_secs(5),
            build_prompt_messages: |_| vec![Message::user("plan the files")],
            build_code_messages: |_| vec![Message::user("write the code")],
        }
    }

    #[tokio::test]
    async fn both_calls_succeeding_produces_two_artifacts() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::always_succeeds("acme-llm", "plan")));
        registry.register(Arc::new(MockBackend::always_succeeds("backup-llm", "code")));

        let mut role_map = RoleMap::new();
        role_map.insert(
            "prompt-builder",
            RoleTarget {
                primary: ("acme-llm".to_string(), "v1".to_string()),
                fallback_chain: vec![],
            },
        );
        role_map.insert(
            "code-generator",
            RoleTarget {
                primary: ("backup-llm".to_string(), "v1".to_string()),
                fallback_chain: vec![],
            },
        );

        let ctx = ctx_for(router_with(registry, role_map));
        let outputs = stage().run(&ctx, StageKey::whole(6), &inputs()).await.unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "code_gen_plan.json");
        assert_eq!(outputs[1].0, "main.rs");
    }

    #[tokio::test]
    async fn one_side_failing_fails_the_whole_stage() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::always_succeeds("acme-llm", "plan")));
        registry.register(Arc::new(MockBackend::new(
            "backup-llm",
            vec![ScriptedOutcome::Fail(ProviderError::Auth {
                provider: "backup-llm".into(),
                message: "bad key".into(),
            })],
        )));

        let mut role_map = RoleMap::new();
        role_map.insert(
            "prompt-builder",
            RoleTarget {
                primary: ("acme-llm".to_string(), "v1".to_string()),
                fallback_chain: vec![],
            },
        );
        role_map.insert(
            "code-generator",
            RoleTarget {
                primary: ("backup-llm".to_string(), "v1".to_string()),
                fallback_chain: vec![],
            },
        );

        let ctx = ctx_for(router_with(registry, role_map));
        let err = stage().run(&ctx, StageKey::whole(6), &inputs()).await.unwrap_err();
        assert!(matches!(err, StageError::PartialCodeGeneration { which: "code-generator", .. }));
    }
}
