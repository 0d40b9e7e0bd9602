//! The Model Router: admission -> cache lookup -> primary attempt -> error
//! classification -> same-provider retry -> fallback chain walk ->
//! exhaustion. State, per call: `pending -> admitting -> {cached,
//! waiting-ticket -> calling -> {succeeded, retrying, falling-back,
//! failed-permanently}}`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use forgepipe_cache::{cache_key, CacheableMessage, CachedResponse, ResponseCache};
use forgepipe_core::call_record::{CallOutcome, CallRecord, FallbackUsed};
use forgepipe_core::ids::CorrelationId;
use forgepipe_cost::{CallCostContext, CostController};
use forgepipe_providers::{ProviderError, ProviderRegistry, ProviderRequest, Role as ProviderRole};
use forgepipe_ratelimit::RateLimiter;

use crate::error::RouterError;
use crate::health::HealthTable;
use crate::price::PriceTable;
use crate::role_map::RoleMap;
use crate::types::{RouteContext, RouteRequest, RouteResponse, RouteTarget};

enum Classification {
    Permanent,
    Transient,
    RateLimited,
}

fn classify(err: &ProviderError) -> Classification {
    match err {
        ProviderError::Quota { .. } => Classification::RateLimited,
        ProviderError::Transport { .. } | ProviderError::Outage { .. } | ProviderError::Timeout { .. } => {
            Classification::Transient
        }
        ProviderError::Auth { .. }
        | ProviderError::MalformedResponse { .. }
        | ProviderError::Misconfiguration { .. }
        | ProviderError::Unknown(_) => Classification::Permanent,
    }
}

pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResponseCache>,
    rate_limiter: Arc<RateLimiter>,
    cost_controller: Arc<CostController>,
    health: Arc<HealthTable>,
    prices: PriceTable,
    role_map: RoleMap,
    retry_budget: u32,
}

impl ModelRouter {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResponseCache>,
        rate_limiter: Arc<RateLimiter>,
        cost_controller: Arc<CostController>,
        health: Arc<HealthTable>,
        prices: PriceTable,
        role_map: RoleMap,
        retry_budget: u32,
    ) -> Self {
        Self {
            registry,
            cache,
            rate_limiter,
            cost_controller,
            health,
            prices,
            role_map,
            retry_budget,
        }
    }

    fn resolve_chain(&self, request: &RouteRequest) -> Result<(String, Vec<(String, String)>), RouterError> {
        match &request.target {
            RouteTarget::Explicit { provider, model } => {
                Ok((role_label_for_explicit(), vec![(provider.clone(), model.clone())]))
            }
            RouteTarget::Role(role) => {
                let target = self
                    .role_map
                    .get(role)
                    .ok_or_else(|| RouterError::UnknownRole(role.clone()))?;
                let mut chain = vec![target.primary.clone()];
                chain.extend(target.fallback_chain.iter().cloned());
                Ok((role.clone(), chain))
            }
        }
    }

    pub async fn route(
        &self,
        ctx: &RouteContext,
        request: RouteRequest,
    ) -> Result<RouteResponse, RouterError> {
        let (role_label, chain) = self.resolve_chain(&request)?;

        let estimated_cost = chain
            .first()
            .map(|(provider, model)| self.prices.cost(provider, model, request.max_tokens as u64, request.max_tokens as u64))
            .unwrap_or(0.0);

        let cost_ctx = CallCostContext {
            build: ctx.build_id,
            tenant: ctx.tenant.clone(),
            user: ctx.user.clone(),
        };
        self.cost_controller.admit_call(&cost_ctx, estimated_cost).await?;

        let cache_key = if request.streaming {
            None
        } else {
            Some(cache_key(
                &chain[0].0,
                &chain[0].1,
                &to_cacheable(&request.messages),
                request.temperature,
            ))
        };

        if let Some(key) = &cache_key
            && let Some(hit) = self.cache.lookup(key).await
        {
            self.cache.touch(key).await;
            debug!(target: "forgepipe::router", provider = %hit.provider, "cache hit");
            return Ok(RouteResponse {
                raw_response: hit.raw_response,
                provider: hit.provider,
                model: hit.model,
                input_tokens: hit.input_tokens,
                output_tokens: hit.output_tokens,
                cost: 0.0,
                cached: true,
                fallback_used: FallbackUsed::No,
                attempts: 0,
            });
        }

        let mut last_error: Option<ProviderError> = None;
        let mut total_attempts = 0u32;
        let mut fallback_used = FallbackUsed::No;

        for (index, (provider, model)) in chain.iter().enumerate() {
            if index > 0 {
                fallback_used = FallbackUsed::Attempted;
            }

            for attempt in 1..=(self.retry_budget + 1) {
                total_attempts += 1;

                let ticket = match self.rate_limiter.admit(provider).await {
                    Ok(ticket) => ticket,
                    Err(_) => {
                        last_error = Some(ProviderError::Unknown(provider.clone()));
                        break;
                    }
                };

                let backend = match self.registry.get(provider) {
                    Ok(backend) => backend,
                    Err(e) => {
                        drop(ticket);
                        last_error = Some(e);
                        break;
                    }
                };

                let provider_request = ProviderRequest {
                    model: model.clone(),
                    messages: request.messages.clone(),
                    temperature: request.temperature,
                    max_tokens: request.max_tokens,
                    timeout: request.timeout,
                    metadata: Default::default(),
                };

                let started = Instant::now();
                let outcome = backend.invoke(provider_request).await;
                let latency_ms = started.elapsed().as_millis() as u64;
                drop(ticket);

                match outcome {
                    Ok(response) => {
                        self.rate_limiter.record_outcome(provider, true).await;
                        self.health.record(provider, true, latency_ms).await;

                        let cost = self.prices.cost(provider, model, response.input_tokens, response.output_tokens);
                        if index > 0 {
                            fallback_used = FallbackUsed::Succeeded;
                        }

                        if let Some(key) = &cache_key {
                            self.cache
                                .store(
                                    key.clone(),
                                    CachedResponse {
                                        raw_response: response.raw_response.clone(),
                                        provider: response.provider.clone(),
                                        model: response.model_used.clone(),
                                        input_tokens: response.input_tokens,
                                        output_tokens: response.output_tokens,
                                    },
                                    None,
                                )
                                .await;
                        }

                        self.emit_record(
                            &cost_ctx,
                            &ctx.project,
                            &role_label,
                            provider,
                            model,
                            response.input_tokens,
                            response.output_tokens,
                            cost,
                            latency_ms,
                            false,
                            fallback_used,
                            CallOutcome::Success,
                        )
                        .await;

                        return Ok(RouteResponse {
                            raw_response: response.raw_response,
                            provider: response.provider,
                            model: response.model_used,
                            input_tokens: response.input_tokens,
                            output_tokens: response.output_tokens,
                            cost,
                            cached: false,
                            fallback_used,
                            attempts: total_attempts,
                        });
                    }
                    Err(err) => {
                        self.rate_limiter.record_outcome(provider, false).await;
                        self.health.record(provider, false, latency_ms).await;

                        let classification = classify(&err);
                        let is_last_attempt = attempt > self.retry_budget;
                        last_error = Some(err);

                        if matches!(classification, Classification::Permanent) {
                            break;
                        }
                        if is_last_attempt {
                            break;
                        }

                        let backoff = backoff_for(&classification, attempt);
                        warn!(
                            target: "forgepipe::router",
                            provider,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "retrying provider call"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        let final_error = last_error.unwrap_or_else(|| ProviderError::Unknown("no provider in chain".to_string()));

        let failure_provider = final_error.provider().unwrap_or("unknown").to_string();
        self.emit_record(
            &cost_ctx,
            &ctx.project,
            &role_label,
            &failure_provider,
            "",
            0,
            0,
            0.0,
            0,
            false,
            fallback_used,
            CallOutcome::Failure,
        )
        .await;

        Err(RouterError::ChainExhausted { last_error: final_error })
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_record(
        &self,
        ctx: &CallCostContext,
        project: &forgepipe_core::ids::ProjectId,
        role: &str,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost: f64,
        latency_ms: u64,
        cached: bool,
        fallback_used: FallbackUsed,
        outcome: CallOutcome,
    ) {
        let record = CallRecord {
            correlation_id: CorrelationId::new(),
            build_id: ctx.build,
            tenant: ctx.tenant.clone(),
            user: ctx.user.clone(),
            project: project.clone(),
            role: role.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
            latency_ms,
            cached,
            fallback_used,
            outcome,
            recorded_at: chrono::Utc::now(),
        };
        self.cost_controller.on_call_completed(record).await;
    }
}

fn role_label_for_explicit() -> String {
    "explicit".to_string()
}

fn to_cacheable(messages: &[forgepipe_providers::Message]) -> Vec<CacheableMessage> {
    messages
        .iter()
        .map(|m| CacheableMessage {
            role: match m.role {
                ProviderRole::System => "system".to_string(),
                ProviderRole::User => "user".to_string(),
                ProviderRole::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        })
        .collect()
}

fn backoff_for(classification: &Classification, attempt: u32) -> Duration {
    let base_ms: u64 = match classification {
        Classification::RateLimited => 1000,
        _ => 200,
    };
    let exponential = base_ms.saturating_mul(1u64 << attempt.min(4));
    let jitter_ms = rand::thread_rng().gen_range(0..=exponential / 4 + 1);
    Duration::from_millis(exponential + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use forgepipe_cache::ResponseCache;
    use forgepipe_config::CostConfig;
    use forgepipe_cost::CostTracker;
    use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
    use forgepipe_providers::{Message, MockBackend, ScriptedOutcome};

    fn ctx() -> RouteContext {
        RouteContext {
            build_id: BuildId::new(),
            tenant: TenantId::from("acme"),
            user: UserId::from("u1"),
            project: ProjectId::from("p1"),
        }
    }

    fn router_with(registry: ProviderRegistry, role_map: RoleMap) -> ModelRouter {
        ModelRouter::new(
            Arc::new(registry),
            Arc::new(ResponseCache::new(100, StdDuration::from_secs(60))),
            Arc::new(RateLimiter::new()),
            Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
            Arc::new(HealthTable::new()),
            PriceTable::new(),
            role_map,
            2,
        )
    }

    fn one_role_chain(primary: (&str, &str), fallbacks: &[(&str, &str)]) -> RoleMap {
        let mut role_map = RoleMap::new();
        role_map.insert(
            "code_generation",
            crate::role_map::RoleTarget {
                primary: (primary.0.to_string(), primary.1.to_string()),
                fallback_chain: fallbacks
                    .iter()
                    .map(|(p, m)| (p.to_string(), m.to_string()))
                    .collect(),
            },
        );
        role_map
    }

    fn request() -> RouteRequest {
        RouteRequest::for_role("code_generation", vec![Message::user("hi")], StdDuration::from_secs(5))
    }

    #[tokio::test]
    async fn a_successful_primary_call_returns_its_response() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::always_succeeds("acme-llm", "ok")));
        let router = router_with(registry, one_role_chain(("acme-llm", "v1"), &[]));

        let response = router.route(&ctx(), request()).await.unwrap();
        assert_eq!(response.provider, "acme-llm");
        assert_eq!(response.fallback_used, FallbackUsed::No);
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn a_transient_failure_is_retried_against_the_same_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::new(
            "acme-llm",
            vec![
                ScriptedOutcome::Fail(ProviderError::Outage {
                    provider: "acme-llm".into(),
                    message: "down".into(),
                }),
                ScriptedOutcome::Respond("recovered".into()),
            ],
        )));
        let router = router_with(registry, one_role_chain(("acme-llm", "v1"), &[]));

        let response = router.route(&ctx(), request()).await.unwrap();
        assert_eq!(response.raw_response, "recovered");
        assert_eq!(response.attempts, 2);
        assert_eq!(response.fallback_used, FallbackUsed::No);
    }

    #[tokio::test]
    async fn exhausting_the_primary_falls_over_to_the_configured_fallback() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::new(
            "acme-llm",
            vec![ScriptedOutcome::Fail(ProviderError::Outage {
                provider: "acme-llm".into(),
                message: "down".into(),
            })],
        )));
        registry.register(Arc::new(MockBackend::always_succeeds("backup-llm", "backup ok")));
        let router = router_with(
            registry,
            one_role_chain(("acme-llm", "v1"), &[("backup-llm", "v1")]),
        );

        let response = router.route(&ctx(), request()).await.unwrap();
        assert_eq!(response.provider, "backup-llm");
        assert_eq!(response.fallback_used, FallbackUsed::Succeeded);
    }

    #[tokio::test]
    async fn a_permanent_failure_skips_straight_to_the_fallback_chain() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::new(
            "acme-llm",
            vec![ScriptedOutcome::Fail(ProviderError::Auth {
                provider: "acme-llm".into(),
                message: "bad credential".into(),
            })],
        )));
        registry.register(Arc::new(MockBackend::always_succeeds("backup-llm", "backup ok")));
        let router = router_with(
            registry,
            one_role_chain(("acme-llm", "v1"), &[("backup-llm", "v1")]),
        );

        let response = router.route(&ctx(), request()).await.unwrap();
        assert_eq!(response.provider, "backup-llm");
        // one attempt against the primary (no retry on a permanent error), then one against the fallback
        assert_eq!(response.attempts, 2);
    }

    #[tokio::test]
    async fn exhausting_every_provider_in_the_chain_returns_chain_exhausted() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::new(
            "acme-llm",
            vec![ScriptedOutcome::Fail(ProviderError::Auth {
                provider: "acme-llm".into(),
                message: "bad credential".into(),
            })],
        )));
        let router = router_with(registry, one_role_chain(("acme-llm", "v1"), &[]));

        let err = router.route(&ctx(), request()).await.unwrap_err();
        assert!(matches!(err, RouterError::ChainExhausted { .. }));
    }

    #[tokio::test]
    async fn an_unknown_role_is_rejected_before_any_provider_is_contacted() {
        let router = router_with(ProviderRegistry::new(), RoleMap::new());
        let err = router.route(&ctx(), request()).await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownRole(_)));
    }

    #[tokio::test]
    async fn a_cache_hit_short_circuits_the_provider_call_entirely() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::always_succeeds("acme-llm", "first")));
        let router = router_with(registry, one_role_chain(("acme-llm", "v1"), &[]));

        let first = router.route(&ctx(), request()).await.unwrap();
        assert!(!first.cached);

        let second = router.route(&ctx(), request()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.raw_response, "first");
    }
}
