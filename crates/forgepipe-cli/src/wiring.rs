//! Explicit dependency-container assembly: every shared subsystem is built
//! once here and handed to the orchestrator via `Arc`, rather than reached
//! for through a global. Swapping a provider or a collaborator for a real
//! implementation means editing this file, not hunting for a singleton.

use std::sync::Arc;

use camino::Utf8PathBuf;

use forgepipe_artifacts::ArtifactStore;
use forgepipe_bus::ProgressBus;
use forgepipe_cache::ResponseCache;
use forgepipe_config::Config;
use forgepipe_cost::{CostController, CostTracker};
use forgepipe_orchestrator::Orchestrator;
use forgepipe_providers::{HttpBackend, HttpBackendConfig, MockBackend, ProviderRegistry};
use forgepipe_ratelimit::RateLimiter;
use forgepipe_router::{ModelRouter, HealthTable, PriceTable, RoleMap, RoleTarget};
use forgepipe_stages::{default_stage_table, StaticCollaborator};

/// The ten role names every stage in the default table routes through. Kept
/// here (rather than re-derived from the stage table) so wiring a role map
/// doesn't need to introspect stage handlers to know what to configure.
const ROLES: &[&str] = &[
    "clarifier",
    "normalizer",
    "refiner",
    "doc-writer",
    "schema-generator",
    "structural-validator",
    "file-planner",
    "scaffolder",
    "prompt-builder",
    "code-generator",
];

async fn build_provider_registry(config: &Config) -> (ProviderRegistry, RateLimiter, String) {
    let mut registry = ProviderRegistry::new();
    let rate_limiter = RateLimiter::new();

    if config.providers.is_empty() {
        registry.register(Arc::new(MockBackend::always_succeeds(
            "mock",
            "{}",
        )));
        return (registry, rate_limiter, "mock".to_string());
    }

    let mut primary = None;
    for (name, provider_config) in &config.providers {
        rate_limiter
            .configure(
                name,
                provider_config.max_concurrent as usize,
                provider_config.min_spacing,
                provider_config.circuit_error_threshold,
                provider_config.circuit_cooldown,
            )
            .await;

        let env_prefix = name.to_uppercase().replace('-', "_");
        let base_url = std::env::var(format!("FORGEPIPE_PROVIDER_{env_prefix}_BASE_URL")).ok();
        let api_key = std::env::var(format!("FORGEPIPE_PROVIDER_{env_prefix}_API_KEY")).ok();

        match (base_url, api_key) {
            (Some(base_url), Some(api_key)) => {
                let auth_header = std::env::var(format!("FORGEPIPE_PROVIDER_{env_prefix}_AUTH_HEADER"))
                    .unwrap_or_else(|_| "x-api-key".to_string());
                match HttpBackend::new(HttpBackendConfig {
                    name: name.clone(),
                    base_url,
                    api_key,
                    auth_header,
                    extra_headers: Vec::new(),
                }) {
                    Ok(backend) => registry.register(Arc::new(backend)),
                    Err(err) => registry.note_construction_failure(name, &err.to_string()),
                }
            }
            _ => {
                registry.note_construction_failure(
                    name,
                    "no FORGEPIPE_PROVIDER_<NAME>_BASE_URL/API_KEY set; registering a mock in its place",
                );
                registry.register(Arc::new(MockBackend::always_succeeds(name.clone(), "{}")));
            }
        }

        primary.get_or_insert_with(|| name.clone());
    }

    (registry, rate_limiter, primary.unwrap_or_else(|| "mock".to_string()))
}

fn build_role_map(primary_provider: &str) -> RoleMap {
    let mut role_map = RoleMap::new();
    for role in ROLES {
        role_map.insert(
            *role,
            RoleTarget {
                primary: (primary_provider.to_string(), "default".to_string()),
                fallback_chain: Vec::new(),
            },
        );
    }
    role_map
}

/// Build every shared subsystem from `config` and assemble the orchestrator
/// that drives builds through them.
pub async fn build_orchestrator(config: &Config, work_dir: Utf8PathBuf) -> Arc<Orchestrator> {
    let (registry, rate_limiter, primary_provider) = build_provider_registry(config).await;

    let cache = ResponseCache::new(config.cache.max_entries, config.cache.ttl);
    let cost_tracker = Arc::new(CostTracker::new(config.cost.retention_days));
    let cost_controller = Arc::new(CostController::new(config.cost.clone(), Arc::clone(&cost_tracker)));
    let health = HealthTable::new();
    let price_table = PriceTable::new();
    let role_map = build_role_map(&primary_provider);

    let router = Arc::new(ModelRouter::new(
        Arc::new(registry),
        Arc::new(cache),
        Arc::new(rate_limiter),
        Arc::clone(&cost_controller),
        Arc::new(health),
        price_table,
        role_map,
        config.orchestrator.default_retry_budget,
    ));

    let artifacts = Arc::new(ArtifactStore::new(work_dir));
    let bus = Arc::new(ProgressBus::new(
        config.progress_bus.history_length,
        config.progress_bus.slow_subscriber_drop_threshold,
    ));

    let hoster = Arc::new(StaticCollaborator {
        descriptor: "local/offline repo publication (no hoster configured)".to_string(),
    });
    let deployer = Arc::new(StaticCollaborator {
        descriptor: "local/offline cloud deployment (no deployer configured)".to_string(),
    });
    let stage_table = default_stage_table(hoster, deployer);

    Arc::new(Orchestrator::new(
        stage_table,
        artifacts,
        bus,
        cost_controller,
        router,
        config.orchestrator.worker_count,
        config.orchestrator.backoff_schedule(),
    ))
}
