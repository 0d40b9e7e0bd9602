use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
use forgepipe_core::stage::StageKey;

use crate::error::ApiError;
use crate::state::SharedState;
use crate::stream::event_stream;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/builds", get(list_builds).post(start_build))
        .route("/builds/{id}", get(get_build))
        .route("/builds/{id}/cancel", post(cancel_build))
        .route("/builds/{id}/retry", post(retry_build))
        .route("/builds/{id}/retry-stage", post(retry_stage))
        .route("/builds/{id}/events", get(subscribe))
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct StartBuildRequest {
    tenant: String,
    user: String,
    project: String,
    spec: serde_json::Value,
}

async fn start_build(
    State(state): State<SharedState>,
    Json(req): Json<StartBuildRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .orchestrator
        .start(TenantId::new(req.tenant), UserId::new(req.user), ProjectId::new(req.project), req.spec)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "build_id": id.to_string() }))))
}

async fn list_builds(State(state): State<SharedState>) -> Json<Vec<forgepipe_core::build::Build>> {
    Json(state.orchestrator.list().await)
}

async fn get_build(
    State(state): State<SharedState>,
    Path(id): Path<BuildId>,
) -> Result<Json<forgepipe_core::build::Build>, ApiError> {
    state
        .orchestrator
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError(forgepipe_orchestrator::OrchestratorError::NoSuchBuild(id)))
}

async fn cancel_build(State(state): State<SharedState>, Path(id): Path<BuildId>) -> Result<StatusCode, ApiError> {
    state.orchestrator.cancel(id).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn retry_build(
    State(state): State<SharedState>,
    Path(id): Path<BuildId>,
) -> Result<impl IntoResponse, ApiError> {
    let new_id = state.orchestrator.retry_build(id).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "build_id": new_id.to_string() }))))
}

#[derive(Deserialize)]
struct RetryStageRequest {
    from: StageKey,
}

async fn retry_stage(
    State(state): State<SharedState>,
    Path(id): Path<BuildId>,
    Json(req): Json<RetryStageRequest>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.retry_stage(id, req.from).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn subscribe(
    State(state): State<SharedState>,
    Path(id): Path<BuildId>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    Sse::new(event_stream(state.orchestrator.subscribe(id).await)).keep_alive(KeepAlive::default())
}
