//! Single-stage execution: preflight, the attempt loop with backoff, and
//! progress emission. One call to [`run_stage`] drives exactly one stage of
//! one build from `pending` to `completed`, `failed`, or `cancelled`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use forgepipe_artifacts::ArtifactStore;
use forgepipe_bus::ProgressBus;
use forgepipe_core::build::{Build, ErrorLogEntry};
use forgepipe_core::error::{ErrorKind, UserFriendlyError};
use forgepipe_core::event::{EventKind, PhasePayload};
use forgepipe_core::ids::BuildId;
use forgepipe_core::stage::{StageKey, StageStatus};
use forgepipe_stages::{StageContext, StageInputs};

use crate::StageEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed,
    Cancelled,
}

fn backoff_for(schedule: &[Duration], attempt: u32) -> Duration {
    let index = attempt.saturating_sub(1) as usize;
    schedule
        .get(index)
        .copied()
        .unwrap_or_else(|| schedule.last().copied().unwrap_or_default())
}

pub async fn run_stage(
    build: &Arc<RwLock<Build>>,
    build_id: BuildId,
    entry: &StageEntry,
    stage_ctx: &StageContext,
    artifacts: &ArtifactStore,
    bus: &ProgressBus,
    backoff_schedule: &[Duration],
) -> StageOutcome {
    let stage = entry.descriptor.key;

    {
        let mut guard = build.write().await;
        guard.stage_status.insert(stage, StageStatus::Running);
        guard.current_stage = Some(stage);
    }
    bus.publish(
        build_id,
        EventKind::Phase {
            stage,
            phase: PhasePayload::Started,
        },
    )
    .await;

    for input in &entry.descriptor.required_inputs {
        if !artifacts.exists(build_id, input).await {
            let mut guard = build.write().await;
            guard.stage_status.insert(stage, StageStatus::Failed);
            guard.mark_failed(ErrorLogEntry {
                kind: ErrorKind::MissingInputArtifact,
                stage: Some(stage),
                attempt: Some(0),
                message: format!("required input artifact '{input}' is missing"),
                correlation_id: None,
                is_final_failure: true,
                recorded_at: Utc::now(),
            });
            drop(guard);
            bus.publish(
                build_id,
                EventKind::Phase {
                    stage,
                    phase: PhasePayload::Failed { is_final_failure: true },
                },
            )
            .await;
            bus.publish(build_id, EventKind::Status { status: "failed".to_string() })
                .await;
            return StageOutcome::Failed;
        }
    }

    let mut attempt: u32 = 1;
    loop {
        if build.read().await.cancel_requested() {
            let mut guard = build.write().await;
            guard.stage_status.insert(stage, StageStatus::Cancelled);
            guard.mark_cancelled();
            drop(guard);
            bus.publish(
                build_id,
                EventKind::Phase {
                    stage,
                    phase: PhasePayload::Cancelled,
                },
            )
            .await;
            bus.publish(build_id, EventKind::Status { status: "cancelled".to_string() })
                .await;
            return StageOutcome::Cancelled;
        }

        let wait = backoff_for(backoff_schedule, attempt);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let inputs = build_inputs(&build.read().await, artifacts, build_id, entry).await;

        let run = tokio::select! {
            biased;
            _ = watch_cancellation(build) => {
                let mut guard = build.write().await;
                guard.stage_status.insert(stage, StageStatus::Cancelled);
                guard.mark_cancelled();
                drop(guard);
                bus.publish(
                    build_id,
                    EventKind::Phase {
                        stage,
                        phase: PhasePayload::Cancelled,
                    },
                )
                .await;
                bus.publish(build_id, EventKind::Status { status: "cancelled".to_string() })
                    .await;
                return StageOutcome::Cancelled;
            }
            result = tokio::time::timeout(
                entry.descriptor.timeout,
                entry.handler.run(stage_ctx, stage, &inputs),
            ) => result,
        };

        match run {
            Ok(Ok(outputs)) => {
                let mut refs = Vec::with_capacity(outputs.len());
                for (name, bytes) in outputs {
                    match artifacts.put(build_id, &name, stage, bytes).await {
                        Ok(reference) => refs.push(reference),
                        Err(err) => {
                            return fail_stage(build, build_id, stage, bus, attempt, ErrorKind::ArtifactWriteError, err.to_string())
                                .await;
                        }
                    }
                }

                let mut guard = build.write().await;
                guard.stage_status.insert(stage, StageStatus::Completed);
                guard.stage_artifacts.insert(stage, refs);
                drop(guard);

                if attempt > 1 {
                    bus.publish(
                        build_id,
                        EventKind::Phase {
                            stage,
                            phase: PhasePayload::RetrySuccess { attempt },
                        },
                    )
                    .await;
                }
                bus.publish(
                    build_id,
                    EventKind::Phase {
                        stage,
                        phase: PhasePayload::Completed,
                    },
                )
                .await;
                bus.publish(
                    build_id,
                    EventKind::Progress {
                        stage,
                        message: format!("stage '{}' completed", entry.descriptor.name),
                    },
                )
                .await;
                return StageOutcome::Completed;
            }
            Ok(Err(stage_err)) => {
                let kind = stage_err.kind();
                let retryable = stage_err.is_retryable() && attempt < entry.descriptor.retry_budget;
                if retryable {
                    let next_backoff = backoff_for(backoff_schedule, attempt + 1);
                    bus.publish(
                        build_id,
                        EventKind::Phase {
                            stage,
                            phase: PhasePayload::Retrying {
                                attempt: attempt + 1,
                                backoff_ms: next_backoff.as_millis() as u64,
                            },
                        },
                    )
                    .await;
                    attempt += 1;
                    continue;
                }
                return fail_stage(build, build_id, stage, bus, attempt, kind, stage_err.user_message()).await;
            }
            Err(_elapsed) => {
                let retryable = attempt < entry.descriptor.retry_budget;
                if retryable {
                    let next_backoff = backoff_for(backoff_schedule, attempt + 1);
                    bus.publish(
                        build_id,
                        EventKind::Phase {
                            stage,
                            phase: PhasePayload::Retrying {
                                attempt: attempt + 1,
                                backoff_ms: next_backoff.as_millis() as u64,
                            },
                        },
                    )
                    .await;
                    attempt += 1;
                    continue;
                }
                return fail_stage(
                    build,
                    build_id,
                    stage,
                    bus,
                    attempt,
                    ErrorKind::Timeout,
                    format!("stage '{}' timed out after {:?}", entry.descriptor.name, entry.descriptor.timeout),
                )
                .await;
            }
        }
    }
}

/// Polls for a cancellation request while a stage attempt is in flight, so a
/// long-running provider call can be abandoned instead of run to completion.
async fn watch_cancellation(build: &Arc<RwLock<Build>>) {
    loop {
        if build.read().await.cancel_requested() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn build_inputs(
    build: &Build,
    artifacts: &ArtifactStore,
    build_id: BuildId,
    entry: &StageEntry,
) -> StageInputs {
    let mut loaded = std::collections::BTreeMap::new();
    for input in &entry.descriptor.required_inputs {
        if let Ok(bytes) = artifacts.get(build_id, input).await {
            loaded.insert(input.clone(), bytes);
        }
    }
    StageInputs {
        original_spec: build.original_spec.clone(),
        artifacts: loaded,
    }
}

async fn fail_stage(
    build: &Arc<RwLock<Build>>,
    build_id: BuildId,
    stage: StageKey,
    bus: &ProgressBus,
    attempt: u32,
    kind: ErrorKind,
    message: String,
) -> StageOutcome {
    let mut guard = build.write().await;
    guard.stage_status.insert(stage, StageStatus::Failed);
    guard.mark_failed(ErrorLogEntry {
        kind,
        stage: Some(stage),
        attempt: Some(attempt),
        message: message.clone(),
        correlation_id: None,
        is_final_failure: true,
        recorded_at: Utc::now(),
    });
    drop(guard);

    bus.publish(
        build_id,
        EventKind::Phase {
            stage,
            phase: PhasePayload::Failed { is_final_failure: true },
        },
    )
    .await;
    bus.publish(
        build_id,
        EventKind::Error {
            kind,
            message,
            retryable: false,
            stage: Some(stage),
            attempt: Some(attempt),
            correlation_id: None,
        },
    )
    .await;
    bus.publish(build_id, EventKind::Status { status: "failed".to_string() })
        .await;
    StageOutcome::Failed
}
