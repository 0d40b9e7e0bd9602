//! Post-merge validation: reject contradictory configuration before it ever
//! reaches a running orchestrator.

use crate::error::ConfigError;
use crate::model::Config;

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.orchestrator.worker_count == 0 {
        return Err(ConfigError::Invalid {
            field: "orchestrator.worker_count".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if config.orchestrator.default_stage_timeout.is_zero() {
        return Err(ConfigError::Invalid {
            field: "orchestrator.default_stage_timeout".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.orchestrator.default_retry_budget == 0 {
        return Err(ConfigError::Invalid {
            field: "orchestrator.default_retry_budget".to_string(),
            reason: "must be at least 1 (the initial attempt)".to_string(),
        });
    }

    let cost = &config.cost;
    if let (Some(per_build), Some(daily)) = (cost.per_build_limit, cost.daily_limit)
        && per_build > daily
    {
        return Err(ConfigError::Invalid {
            field: "cost.per_build_limit".to_string(),
            reason: "cannot exceed cost.daily_limit".to_string(),
        });
    }
    if let (Some(daily), Some(monthly)) = (cost.daily_limit, cost.monthly_limit)
        && daily > monthly
    {
        return Err(ConfigError::Invalid {
            field: "cost.daily_limit".to_string(),
            reason: "cannot exceed cost.monthly_limit".to_string(),
        });
    }
    if let (Some(emergency), Some(daily)) = (cost.emergency_stop_daily, cost.daily_limit)
        && emergency < daily
    {
        return Err(ConfigError::Invalid {
            field: "cost.emergency_stop_daily".to_string(),
            reason: "must be at least cost.daily_limit, or it would fire before the normal limit"
                .to_string(),
        });
    }

    for (name, provider) in &config.providers {
        if provider.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: format!("providers.{name}.max_concurrent"),
                reason: "must be at least 1".to_string(),
            });
        }
        if provider.circuit_error_threshold <= 0.0 || provider.circuit_error_threshold > 1.0 {
            return Err(ConfigError::Invalid {
                field: format!("providers.{name}.circuit_error_threshold"),
                reason: "must be in (0.0, 1.0]".to_string(),
            });
        }
    }

    if config.cache.max_entries == 0 {
        return Err(ConfigError::Invalid {
            field: "cache.max_entries".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_worker_count_is_rejected() {
        let mut config = Config::default();
        config.orchestrator.worker_count = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn per_build_limit_above_daily_limit_is_rejected() {
        let mut config = Config::default();
        config.cost.daily_limit = Some(10.0);
        config.cost.per_build_limit = Some(20.0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn emergency_stop_below_daily_limit_is_rejected() {
        let mut config = Config::default();
        config.cost.daily_limit = Some(100.0);
        config.cost.emergency_stop_daily = Some(50.0);
        assert!(validate(&config).is_err());
    }
}
