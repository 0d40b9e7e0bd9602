//! Layered configuration loading.
//!
//! Layers, later overriding earlier: compiled-in defaults -> an optional
//! `forgepipe.toml` discovered by walking upward from the working directory
//! -> `FORGEPIPE_*` environment variables -> explicit overrides made by the
//! embedding binary directly on the returned [`Config`]. A validation pass
//! runs after every merge and rejects contradictory values with a
//! [`ConfigError`] that names the offending field.

pub mod discovery;
pub mod error;
pub mod model;
pub mod validation;

pub use error::ConfigError;
pub use model::{CacheConfig, Config, CostConfig, OrchestratorConfig, ProgressBusConfig, ProviderConfig};

use camino::Utf8Path;
use std::collections::BTreeMap;

/// Load configuration starting from `cwd`, applying the file and environment
/// layers, then validating the result.
pub fn load(cwd: &Utf8Path) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if let Some(path) = discovery::discover(cwd) {
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
    }

    apply_env_overrides(&mut config, &std::env::vars().collect());

    validation::validate(&config)?;
    Ok(config)
}

/// Apply `FORGEPIPE_*` environment overrides on top of an already-merged
/// config. Exposed separately from [`load`] so tests can inject a synthetic
/// environment map instead of mutating the real process environment.
pub fn apply_env_overrides(config: &mut Config, env: &BTreeMap<String, String>) {
    if let Some(v) = env.get("FORGEPIPE_WORKER_COUNT").and_then(|s| s.parse().ok()) {
        config.orchestrator.worker_count = v;
    }
    if let Some(v) = env
        .get("FORGEPIPE_COST_DAILY_LIMIT")
        .and_then(|s| s.parse().ok())
    {
        config.cost.daily_limit = Some(v);
    }
    if let Some(v) = env
        .get("FORGEPIPE_COST_MONTHLY_LIMIT")
        .and_then(|s| s.parse().ok())
    {
        config.cost.monthly_limit = Some(v);
    }
    if let Some(v) = env
        .get("FORGEPIPE_COST_PER_BUILD_LIMIT")
        .and_then(|s| s.parse().ok())
    {
        config.cost.per_build_limit = Some(v);
    }
    if let Some(v) = env
        .get("FORGEPIPE_CACHE_MAX_ENTRIES")
        .and_then(|s| s.parse().ok())
    {
        config.cache.max_entries = v;
    }
    if let Some(v) = env
        .get("FORGEPIPE_PROGRESS_BUS_HISTORY_LENGTH")
        .and_then(|s| s.parse().ok())
    {
        config.progress_bus.history_length = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply_on_top_of_defaults() {
        let mut config = Config::default();
        let env = BTreeMap::from([
            ("FORGEPIPE_WORKER_COUNT".to_string(), "16".to_string()),
            ("FORGEPIPE_COST_DAILY_LIMIT".to_string(), "250.5".to_string()),
        ]);
        apply_env_overrides(&mut config, &env);
        assert_eq!(config.orchestrator.worker_count, 16);
        assert_eq!(config.cost.daily_limit, Some(250.5));
    }

    #[test]
    fn malformed_env_values_are_ignored_not_fatal() {
        let mut config = Config::default();
        let default_workers = config.orchestrator.worker_count;
        let env = BTreeMap::from([("FORGEPIPE_WORKER_COUNT".to_string(), "not-a-number".to_string())]);
        apply_env_overrides(&mut config, &env);
        assert_eq!(config.orchestrator.worker_count, default_workers);
    }
}
