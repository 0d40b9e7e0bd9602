//! The configuration surface: every knob named in the external-interfaces
//! config list, with conservative compiled-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

fn duration_ms<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms = u64::deserialize(de)?;
    Ok(Duration::from_millis(ms))
}

/// Top-level configuration, assembled by [`crate::load`] from the layered
/// sources described in the crate docs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub cache: CacheConfig,
    pub cost: CostConfig,
    pub progress_bus: ProgressBusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            providers: BTreeMap::new(),
            cache: CacheConfig::default(),
            cost: CostConfig::default(),
            progress_bus: ProgressBusConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub worker_count: usize,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub default_stage_timeout: Duration,
    pub default_retry_budget: u32,
    /// Backoff schedule between attempts, in milliseconds.
    pub backoff_schedule_ms: Vec<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            default_stage_timeout: Duration::from_secs(120),
            default_retry_budget: forgepipe_core::stage::DEFAULT_RETRY_BUDGET,
            backoff_schedule_ms: vec![0, 500, 1500],
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_schedule_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub max_concurrent: u32,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub min_spacing: Duration,
    /// Error rate (0.0-1.0) over the health window above which the circuit opens.
    pub circuit_error_threshold: f64,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub circuit_cooldown: Duration,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub call_timeout: Duration,
    pub fallback_chain: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            min_spacing: Duration::from_millis(50),
            circuit_error_threshold: 0.5,
            circuit_cooldown: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
            fallback_chain: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub ttl: Duration,
    #[serde(serialize_with = "ser_duration_ms", deserialize_with = "duration_ms")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    #[serde(deserialize_with = "opt_f64", default)]
    pub daily_limit: Option<f64>,
    #[serde(deserialize_with = "opt_f64", default)]
    pub monthly_limit: Option<f64>,
    #[serde(deserialize_with = "opt_f64", default)]
    pub per_build_limit: Option<f64>,
    #[serde(deserialize_with = "opt_f64", default)]
    pub per_user_daily: Option<f64>,
    #[serde(deserialize_with = "opt_f64", default)]
    pub per_tenant_daily: Option<f64>,
    #[serde(deserialize_with = "opt_f64", default)]
    pub emergency_stop_daily: Option<f64>,
    pub retention_days: u32,
}

fn opt_f64<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::deserialize(de)
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            daily_limit: None,
            monthly_limit: None,
            per_build_limit: None,
            per_user_daily: None,
            per_tenant_daily: None,
            emergency_stop_daily: None,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressBusConfig {
    pub history_length: usize,
    pub slow_subscriber_drop_threshold: usize,
}

impl Default for ProgressBusConfig {
    fn default() -> Self {
        Self {
            history_length: 64,
            slow_subscriber_drop_threshold: 1024,
        }
    }
}

fn ser_duration_ms<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_obvious_sanity_bounds() {
        let config = Config::default();
        assert!(config.orchestrator.worker_count > 0);
        assert!(!config.orchestrator.backoff_schedule_ms.is_empty());
        assert!(config.cache.max_entries > 0);
    }

    #[test]
    fn backoff_schedule_converts_to_durations() {
        let config = OrchestratorConfig::default();
        let schedule = config.backoff_schedule();
        assert_eq!(schedule[0], Duration::from_millis(0));
        assert_eq!(schedule[1], Duration::from_millis(500));
        assert_eq!(schedule[2], Duration::from_millis(1500));
    }
}
