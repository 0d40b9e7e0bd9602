use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use forgepipe_artifacts::ArtifactStore;
use forgepipe_bus::ProgressBus;
use forgepipe_cache::ResponseCache;
use forgepipe_config::CostConfig;
use forgepipe_core::ids::BuildId;
use forgepipe_core::stage::{StageDescriptor, StageKey};
use forgepipe_cost::{CostController, CostTracker};
use forgepipe_providers::ProviderRegistry;
use forgepipe_ratelimit::RateLimiter;
use forgepipe_router::{HealthTable, ModelRouter, PriceTable, RoleMap};
use forgepipe_stages::{StageContext, StageEntry, StageError, StageHandler, StageInputs};

struct Produces;

#[async_trait]
impl StageHandler for Produces {
    async fn run(
        &self,
        _ctx: &StageContext,
        _stage: StageKey,
        _inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError> {
        Ok(vec![("out.json".to_string(), b"{}".to_vec())])
    }
}

fn test_orchestrator() -> (Arc<forgepipe_orchestrator::Orchestrator>, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let root = camino::Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let router = Arc::new(ModelRouter::new(
        Arc::new(ProviderRegistry::new()),
        Arc::new(ResponseCache::new(10, Duration::from_secs(60))),
        Arc::new(RateLimiter::new()),
        Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
        Arc::new(HealthTable::new()),
        PriceTable::new(),
        RoleMap::new(),
        1,
    ));
    let table = vec![StageEntry {
        descriptor: StageDescriptor::new(StageKey::whole(0), "only_stage")
            .with_outputs(["out.json"])
            .with_retry_budget(1),
        handler: Arc::new(Produces),
    }];
    let orchestrator = forgepipe_orchestrator::Orchestrator::new(
        table,
        Arc::new(ArtifactStore::new(root)),
        Arc::new(ProgressBus::new(64, 16)),
        Arc::new(CostController::new(CostConfig::default(), Arc::new(CostTracker::new(30)))),
        router,
        4,
        vec![Duration::from_millis(0)],
    );
    (Arc::new(orchestrator), dir)
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (orchestrator, _dir) = test_orchestrator();
    let app = forgepipe_api::build_router(orchestrator);

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn starting_a_build_returns_its_id_and_then_get_finds_it() {
    let (orchestrator, _dir) = test_orchestrator();
    let app = forgepipe_api::build_router(orchestrator);

    let body = serde_json::json!({
        "tenant": "acme",
        "user": "u1",
        "project": "p1",
        "spec": {"app": "Todo"},
    });
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/builds")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let build_id = created["build_id"].as_str().unwrap();

    let resp = app
        .oneshot(Request::builder().uri(format!("/builds/{build_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn getting_an_unknown_build_returns_not_found() {
    let (orchestrator, _dir) = test_orchestrator();
    let app = forgepipe_api::build_router(orchestrator);

    let missing = BuildId::new();
    let resp = app
        .oneshot(Request::builder().uri(format!("/builds/{missing}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelling_an_unknown_build_returns_not_found() {
    let (orchestrator, _dir) = test_orchestrator();
    let app = forgepipe_api::build_router(orchestrator);

    let missing = BuildId::new();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/builds/{missing}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
