//! The Pipeline Orchestrator: owns the build registry, runs each build's
//! stages to completion in a spawned task, and exposes the handful of
//! operations the Control API surfaces.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};

use forgepipe_artifacts::ArtifactStore;
use forgepipe_bus::{ProgressBus, Subscription};
use forgepipe_core::build::Build;
use forgepipe_core::event::EventKind;
use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
use forgepipe_core::stage::{StageKey, StageStatus};
use forgepipe_cost::{BuildCostContext, CostController};
use forgepipe_router::ModelRouter;
use forgepipe_stages::StageContext;

use crate::error::OrchestratorError;
use crate::executor::{run_stage, StageOutcome};
use crate::registry::BuildRegistry;

pub use forgepipe_stages::StageEntry;

pub struct Orchestrator {
    stage_table: Vec<StageEntry>,
    artifacts: Arc<ArtifactStore>,
    bus: Arc<ProgressBus>,
    cost: Arc<CostController>,
    router: Arc<ModelRouter>,
    registry: BuildRegistry,
    semaphore: Arc<Semaphore>,
    backoff_schedule: Vec<Duration>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        stage_table: Vec<StageEntry>,
        artifacts: Arc<ArtifactStore>,
        bus: Arc<ProgressBus>,
        cost: Arc<CostController>,
        router: Arc<ModelRouter>,
        worker_count: usize,
        backoff_schedule: Vec<Duration>,
    ) -> Self {
        Self {
            stage_table,
            artifacts,
            bus,
            cost,
            router,
            registry: BuildRegistry::new(),
            semaphore: Arc::new(Semaphore::new(worker_count.max(1))),
            backoff_schedule,
        }
    }

    /// Queue a new build and spawn its execution. Returns immediately with
    /// the new build's id; the build runs in the background.
    pub async fn start(
        self: &Arc<Self>,
        tenant: TenantId,
        user: UserId,
        project: ProjectId,
        original_spec: serde_json::Value,
    ) -> Result<BuildId, OrchestratorError> {
        self.cost.admit_build(&BuildCostContext { tenant: tenant.clone() })?;

        let build = Build::new(tenant, user, project, original_spec);
        let id = build.id;
        let handle = self.registry.insert(build).await;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_build(handle, None).await });

        Ok(id)
    }

    pub async fn get(&self, id: BuildId) -> Option<Build> {
        self.registry.snapshot(id).await
    }

    pub async fn list(&self) -> Vec<Build> {
        self.registry.list().await
    }

    pub async fn subscribe(&self, id: BuildId) -> Subscription {
        self.bus.subscribe(id).await
    }

    pub async fn cancel(&self, id: BuildId) -> Result<(), OrchestratorError> {
        let handle = self.registry.handle(id).await.ok_or(OrchestratorError::NoSuchBuild(id))?;
        let mut guard = handle.write().await;
        if guard.status.is_terminal() {
            return Err(OrchestratorError::NotTerminal(id));
        }
        guard.request_cancel();
        Ok(())
    }

    /// Clone a terminal build's original spec into a brand-new queued build
    /// and run it from the first stage.
    pub async fn retry_build(self: &Arc<Self>, id: BuildId) -> Result<BuildId, OrchestratorError> {
        let old = self.registry.snapshot(id).await.ok_or(OrchestratorError::NoSuchBuild(id))?;
        if !old.status.is_terminal() {
            return Err(OrchestratorError::NotTerminal(id));
        }

        self.cost.admit_build(&BuildCostContext { tenant: old.tenant.clone() })?;

        let retried = old.retry_as_new();
        let new_id = retried.id;
        let handle = self.registry.insert(retried).await;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_build(handle, None).await });

        Ok(new_id)
    }

    /// Reset one stage and every stage ordered after it, then re-run the
    /// build in place starting from that stage.
    pub async fn retry_stage(self: &Arc<Self>, id: BuildId, from: StageKey) -> Result<(), OrchestratorError> {
        let handle = self.registry.handle(id).await.ok_or(OrchestratorError::NoSuchBuild(id))?;
        {
            let mut guard = handle.write().await;
            if !guard.status.is_terminal() {
                return Err(OrchestratorError::NotTerminal(id));
            }
            guard.reset_stage_and_downstream(from);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_build(handle, Some(from)).await });

        Ok(())
    }

    async fn run_build(self: Arc<Self>, handle: Arc<RwLock<Build>>, resume_from: Option<StageKey>) {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let (build_id, tenant, user, project) = {
            let mut guard = handle.write().await;
            if resume_from.is_none() {
                guard.mark_running();
            }
            (guard.id, guard.tenant.clone(), guard.user.clone(), guard.project.clone())
        };

        info!(target: "forgepipe::orchestrator", %build_id, "build started");
        self.bus
            .publish(build_id, EventKind::Status { status: "running".to_string() })
            .await;

        let stage_ctx = StageContext {
            build_id,
            tenant,
            user,
            project,
            router: Arc::clone(&self.router),
        };

        for entry in &self.stage_table {
            let already_done = matches!(
                handle.read().await.stage_status.get(&entry.descriptor.key),
                Some(StageStatus::Completed)
            );
            if already_done {
                continue;
            }

            let outcome = run_stage(
                &handle,
                build_id,
                entry,
                &stage_ctx,
                &self.artifacts,
                &self.bus,
                &self.backoff_schedule,
            )
            .await;

            match outcome {
                StageOutcome::Completed => continue,
                StageOutcome::Failed => {
                    warn!(target: "forgepipe::orchestrator", %build_id, stage = %entry.descriptor.key, "build failed");
                    return;
                }
                StageOutcome::Cancelled => {
                    info!(target: "forgepipe::orchestrator", %build_id, "build cancelled");
                    return;
                }
            }
        }

        handle.write().await.mark_completed();
        info!(target: "forgepipe::orchestrator", %build_id, "build completed");
        self.bus
            .publish(build_id, EventKind::Status { status: "completed".to_string() })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use forgepipe_cache::ResponseCache;
    use forgepipe_config::CostConfig;
    use forgepipe_cost::CostTracker;
    use forgepipe_core::stage::StageDescriptor;
    use forgepipe_providers::ProviderRegistry;
    use forgepipe_ratelimit::RateLimiter;
    use forgepipe_router::{HealthTable, PriceTable, RoleMap};
    use forgepipe_stages::{StageError, StageHandler};
    use tempfile::TempDir;

    fn test_router() -> Arc<ModelRouter> {
        Arc::new(ModelRouter::new(
            Arc::new(ProviderRegistry::new()),
            Arc::new(ResponseCache::new(10, StdDuration::from_secs(60))),
            Arc::new(RateLimiter::new()),
            Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
            Arc::new(HealthTable::new()),
            PriceTable::new(),
            RoleMap::new(),
            1,
        ))
    }

    struct Produces {
        output: &'static str,
    }

    #[async_trait]
    impl StageHandler for Produces {
        async fn run(
            &self,
            _ctx: &StageContext,
            _stage: StageKey,
            _inputs: &forgepipe_stages::StageInputs,
        ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
            Ok(vec![(self.output.to_string(), b"ok".to_vec())])
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl StageHandler for AlwaysFails {
        async fn run(
            &self,
            _ctx: &StageContext,
            _stage: StageKey,
            _inputs: &forgepipe_stages::StageInputs,
        ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
            Err(StageError::NoOutput("never".to_string()))
        }
    }

    struct Never;

    #[async_trait]
    impl StageHandler for Never {
        async fn run(
            &self,
            _ctx: &StageContext,
            _stage: StageKey,
            _inputs: &forgepipe_stages::StageInputs,
        ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
            tokio::time::sleep(StdDuration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn two_stage_table() -> Vec<StageEntry> {
        vec![
            StageEntry {
                descriptor: StageDescriptor::new(StageKey::whole(0), "produce_a")
                    .with_outputs(["a.json"])
                    .with_retry_budget(1),
                handler: Arc::new(Produces { output: "a.json" }),
            },
            StageEntry {
                descriptor: StageDescriptor::new(StageKey::whole(1), "produce_b")
                    .with_inputs(["a.json"])
                    .with_outputs(["b.json"])
                    .with_retry_budget(1),
                handler: Arc::new(Produces { output: "b.json" }),
            },
        ]
    }

    fn test_orchestrator(stage_table: Vec<StageEntry>) -> (Arc<Orchestrator>, TempDir) {
        let dir = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let orchestrator = Orchestrator::new(
            stage_table,
            Arc::new(ArtifactStore::new(root)),
            Arc::new(ProgressBus::new(64, 16)),
            Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
            test_router(),
            4,
            vec![StdDuration::from_millis(0), StdDuration::from_millis(10)],
        );
        (Arc::new(orchestrator), dir)
    }

    #[tokio::test]
    async fn a_build_runs_every_stage_to_completion() {
        let (orchestrator, _dir) = test_orchestrator(two_stage_table());
        let id = orchestrator
            .start(
                TenantId::new("acme"),
                UserId::new("u1"),
                ProjectId::new("p1"),
                serde_json::json!({"app": "Todo"}),
            )
            .await
            .unwrap();

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let build = orchestrator.get(id).await.unwrap();
        assert_eq!(build.status, forgepipe_core::build::BuildStatus::Completed);
        assert_eq!(build.stage_status.len(), 2);
        assert!(build
            .stage_status
            .values()
            .all(|status| *status == StageStatus::Completed));
    }

    #[tokio::test]
    async fn a_failing_stage_fails_the_build_and_records_the_error() {
        let table = vec![StageEntry {
            descriptor: StageDescriptor::new(StageKey::whole(0), "broken").with_retry_budget(1),
            handler: Arc::new(AlwaysFails),
        }];
        let (orchestrator, _dir) = test_orchestrator(table);
        let id = orchestrator
            .start(TenantId::new("acme"), UserId::new("u1"), ProjectId::new("p1"), serde_json::json!({}))
            .await
            .unwrap();

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let build = orchestrator.get(id).await.unwrap();
        assert_eq!(build.status, forgepipe_core::build::BuildStatus::Failed);
        assert!(build.error_message().is_some());
    }

    #[tokio::test]
    async fn a_missing_input_artifact_fails_the_stage_without_retrying() {
        let table = vec![StageEntry {
            descriptor: StageDescriptor::new(StageKey::whole(0), "needs_upstream")
                .with_inputs(["never_produced.json"])
                .with_retry_budget(3),
            handler: Arc::new(Produces { output: "irrelevant.json" }),
        }];
        let (orchestrator, _dir) = test_orchestrator(table);
        let id = orchestrator
            .start(TenantId::new("acme"), UserId::new("u1"), ProjectId::new("p1"), serde_json::json!({}))
            .await
            .unwrap();

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let build = orchestrator.get(id).await.unwrap();
        assert_eq!(build.status, forgepipe_core::build::BuildStatus::Failed);
        assert_eq!(
            build.error_log.first().unwrap().kind,
            forgepipe_core::error::ErrorKind::MissingInputArtifact
        );
    }

    #[tokio::test]
    async fn cancelling_a_running_build_stops_it() {
        let table = vec![StageEntry {
            descriptor: StageDescriptor::new(StageKey::whole(0), "slow").with_retry_budget(1),
            handler: Arc::new(Never),
        }];
        let (orchestrator, _dir) = test_orchestrator(table);
        let id = orchestrator
            .start(TenantId::new("acme"), UserId::new("u1"), ProjectId::new("p1"), serde_json::json!({}))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        orchestrator.cancel(id).await.unwrap();

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let build = orchestrator.get(id).await.unwrap();
        assert_eq!(build.status, forgepipe_core::build::BuildStatus::Cancelled);
    }

    #[tokio::test]
    async fn retry_build_clones_a_fresh_build_from_a_terminal_failure() {
        let table = vec![StageEntry {
            descriptor: StageDescriptor::new(StageKey::whole(0), "broken").with_retry_budget(1),
            handler: Arc::new(AlwaysFails),
        }];
        let (orchestrator, _dir) = test_orchestrator(table);
        let id = orchestrator
            .start(TenantId::new("acme"), UserId::new("u1"), ProjectId::new("p1"), serde_json::json!({"k": "v"}))
            .await
            .unwrap();

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let retried_id = orchestrator.retry_build(id).await.unwrap();
        assert_ne!(retried_id, id);

        for _ in 0..50 {
            if let Some(build) = orchestrator.get(retried_id).await {
                if build.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        let retried = orchestrator.get(retried_id).await.unwrap();
        assert_eq!(retried.original_spec, serde_json::json!({"k": "v"}));
    }
}
