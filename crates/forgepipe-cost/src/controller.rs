//! Admission policy layered over the [`crate::tracker::CostTracker`]'s
//! aggregates: every configured limit is optional, and an absent limit never
//! denies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::warn;

use forgepipe_config::CostConfig;
use forgepipe_core::ids::{BuildId, TenantId, UserId};

use crate::error::CostError;
use crate::tracker::CostTracker;

#[derive(Debug, Clone)]
pub struct BuildCostContext {
    pub tenant: TenantId,
}

#[derive(Debug, Clone)]
pub struct CallCostContext {
    pub build: BuildId,
    pub tenant: TenantId,
    pub user: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostAlert {
    pub limit_name: String,
    pub threshold_pct: u8,
    pub limit: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Admission {
    pub alerts: Vec<CostAlert>,
}

pub struct CostController {
    config: CostConfig,
    tracker: Arc<CostTracker>,
    emergency_stopped: AtomicBool,
}

impl CostController {
    #[must_use]
    pub fn new(config: CostConfig, tracker: Arc<CostTracker>) -> Self {
        Self {
            config,
            tracker,
            emergency_stopped: AtomicBool::new(false),
        }
    }

    /// Checked once when a build transitions `queued -> running`.
    pub fn admit_build(&self, _ctx: &BuildCostContext) -> Result<(), CostError> {
        if self.emergency_stopped.load(Ordering::SeqCst) {
            return Err(CostError::EmergencyStopActive);
        }
        Ok(())
    }

    /// Checked before every Model Router call. A denial short-circuits the
    /// call entirely: no provider request is made.
    pub async fn admit_call(
        &self,
        ctx: &CallCostContext,
        estimated_cost: f64,
    ) -> Result<Admission, CostError> {
        if self.emergency_stopped.load(Ordering::SeqCst) {
            return Err(CostError::EmergencyStopActive);
        }

        let now = Utc::now();
        let today = now.date_naive();
        let mut alerts = Vec::new();

        if let Some(limit) = self.config.emergency_stop_daily {
            let projected = self.tracker.global_daily(today).await + estimated_cost;
            if projected >= limit {
                return Err(CostError::Denied {
                    limit_name: "emergency_stop_daily".to_string(),
                    limit,
                    current: projected,
                });
            }
        }

        check_limit(
            "daily_limit",
            self.config.daily_limit,
            self.tracker.global_daily(today).await,
            estimated_cost,
            &mut alerts,
        )?;

        check_limit(
            "monthly_limit",
            self.config.monthly_limit,
            self.tracker.global_monthly(today.year(), today.month()).await,
            estimated_cost,
            &mut alerts,
        )?;

        check_limit(
            "per_build_limit",
            self.config.per_build_limit,
            self.tracker.per_build(ctx.build).await,
            estimated_cost,
            &mut alerts,
        )?;

        check_limit(
            "per_user_daily",
            self.config.per_user_daily,
            self.tracker.per_user_daily(today, &ctx.user).await,
            estimated_cost,
            &mut alerts,
        )?;

        check_limit(
            "per_tenant_daily",
            self.config.per_tenant_daily,
            self.tracker.per_tenant_daily(today, &ctx.tenant).await,
            estimated_cost,
            &mut alerts,
        )?;

        for alert in &alerts {
            warn!(
                target: "forgepipe::cost",
                limit_name = %alert.limit_name,
                threshold_pct = alert.threshold_pct,
                limit = alert.limit,
                current = alert.current,
                "cost threshold alert"
            );
        }

        Ok(Admission { alerts })
    }

    /// Reconcile the Model Router's cost estimate against the actual
    /// recorded cost. The record itself is expected to already carry the
    /// authoritative `cost` field; this just drives the tracker and surfaces
    /// any alert that the actual (rather than estimated) figure crosses.
    pub async fn on_call_completed(&self, record: forgepipe_core::call_record::CallRecord) -> bool {
        self.tracker.record(record).await
    }

    pub fn emergency_stop(&self) {
        self.emergency_stopped.store(true, Ordering::SeqCst);
    }

    pub fn emergency_resume(&self) {
        self.emergency_stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped.load(Ordering::SeqCst)
    }
}

fn check_limit(
    name: &str,
    limit: Option<f64>,
    current: f64,
    estimated_cost: f64,
    alerts: &mut Vec<CostAlert>,
) -> Result<(), CostError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let projected = current + estimated_cost;
    if projected >= limit {
        return Err(CostError::Denied {
            limit_name: name.to_string(),
            limit,
            current: projected,
        });
    }
    let ratio = projected / limit;
    if ratio >= 1.0 {
        alerts.push(CostAlert {
            limit_name: name.to_string(),
            threshold_pct: 100,
            limit,
            current: projected,
        });
    } else if ratio >= 0.8 {
        alerts.push(CostAlert {
            limit_name: name.to_string(),
            threshold_pct: 80,
            limit,
            current: projected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgepipe_core::call_record::{CallOutcome, FallbackUsed};
    use forgepipe_core::ids::{BuildId, CorrelationId, ProjectId};

    fn ctx() -> CallCostContext {
        CallCostContext {
            build: BuildId::new(),
            tenant: TenantId::from("acme"),
            user: UserId::from("u1"),
        }
    }

    #[tokio::test]
    async fn admit_call_allows_when_no_limits_configured() {
        let controller = CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)));
        assert!(controller.admit_call(&ctx(), 5.0).await.is_ok());
    }

    #[tokio::test]
    async fn admit_call_denies_once_per_build_limit_would_be_exceeded() {
        let mut config = CostConfig::default();
        config.per_build_limit = Some(1.0);
        let tracker = Arc::new(CostTracker::new(30));
        let controller = CostController::new(config, Arc::clone(&tracker));
        let call_ctx = ctx();

        tracker
            .record(forgepipe_core::call_record::CallRecord {
                correlation_id: CorrelationId::new(),
                build_id: call_ctx.build,
                tenant: call_ctx.tenant.clone(),
                user: call_ctx.user.clone(),
                project: ProjectId::from("p1"),
                role: "code_generation".to_string(),
                provider: "acme-llm".to_string(),
                model: "v1".to_string(),
                input_tokens: 10,
                output_tokens: 10,
                cost: 0.9,
                latency_ms: 100,
                cached: false,
                fallback_used: FallbackUsed::No,
                outcome: CallOutcome::Success,
                recorded_at: Utc::now(),
            })
            .await;

        let result = controller.admit_call(&call_ctx, 0.5).await;
        assert!(matches!(result, Err(CostError::Denied { .. })));
    }

    #[tokio::test]
    async fn emergency_stop_denies_new_builds_and_calls() {
        let controller = CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)));
        controller.emergency_stop();
        assert!(controller
            .admit_build(&BuildCostContext {
                tenant: TenantId::from("acme"),
            })
            .is_err());
        assert!(controller.admit_call(&ctx(), 1.0).await.is_err());
        controller.emergency_resume();
        assert!(controller.admit_call(&ctx(), 1.0).await.is_ok());
    }
}
