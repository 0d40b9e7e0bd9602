//! The `Build` aggregate and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::artifact::ArtifactRef;
use crate::error::ErrorKind;
use crate::ids::{BuildId, CorrelationId, ProjectId, TenantId, UserId};
use crate::stage::{StageKey, StageStatus};

/// A build's overall lifecycle state. Transitions only along
/// `queued -> running -> {completed, failed, cancelled}`; once terminal, a
/// `Build` is never mutated again except by cloning it into a fresh `queued`
/// build via a whole-build retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BuildStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One entry in a build's ordered error log. The last entry, if the build is
/// `failed`, is authoritative for the build's user-visible error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub kind: ErrorKind,
    pub stage: Option<StageKey>,
    pub attempt: Option<u32>,
    /// Operator-safe, already-redacted message.
    pub message: String,
    pub correlation_id: Option<CorrelationId>,
    pub is_final_failure: bool,
    pub recorded_at: DateTime<Utc>,
}

/// The full aggregate for one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub tenant: TenantId,
    pub user: UserId,
    pub project: ProjectId,
    pub status: BuildStatus,
    pub current_stage: Option<StageKey>,
    pub stage_status: BTreeMap<StageKey, StageStatus>,
    pub stage_artifacts: BTreeMap<StageKey, Vec<ArtifactRef>>,
    pub error_log: Vec<ErrorLogEntry>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The original build spec as submitted by the caller, opaque to this
    /// system beyond being handed to stage handlers as context.
    pub original_spec: serde_json::Value,
    cancel_requested: bool,
}

impl Build {
    #[must_use]
    pub fn new(
        tenant: TenantId,
        user: UserId,
        project: ProjectId,
        original_spec: serde_json::Value,
    ) -> Self {
        Self {
            id: BuildId::new(),
            tenant,
            user,
            project,
            status: BuildStatus::Queued,
            current_stage: None,
            stage_status: BTreeMap::new(),
            stage_artifacts: BTreeMap::new(),
            error_log: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            original_spec,
            cancel_requested: false,
        }
    }

    /// Clone this build's original spec into a brand-new, freshly-queued
    /// build -- a whole-build retry. The new build shares no mutable state
    /// (artifact namespace, Progress Bus topic, id) with the original.
    #[must_use]
    pub fn retry_as_new(&self) -> Self {
        Self::new(
            self.tenant.clone(),
            self.user.clone(),
            self.project.clone(),
            self.original_spec.clone(),
        )
    }

    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.status, BuildStatus::Queued);
        self.status = BuildStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        debug_assert_eq!(self.status, BuildStatus::Running);
        self.status = BuildStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, entry: ErrorLogEntry) {
        self.error_log.push(entry);
        self.status = BuildStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = BuildStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    #[must_use]
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// The build's authoritative user-visible error, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_log.last().map(|e| e.message.as_str())
    }

    /// Reset one stage and every stage ordered after it back to `pending`,
    /// for a `retry-stage` operation. Artifact pointers for earlier stages
    /// are left untouched; the target stage's own prior artifacts (if any)
    /// are cleared since its own retry is about to overwrite them.
    pub fn reset_stage_and_downstream(&mut self, from: StageKey) {
        let downstream: Vec<StageKey> = self
            .stage_status
            .keys()
            .copied()
            .filter(|k| *k >= from)
            .collect();
        for key in downstream {
            self.stage_status.insert(key, StageStatus::Pending);
            self.stage_artifacts.remove(&key);
        }
        self.current_stage = Some(from);
        self.status = BuildStatus::Running;
        self.cancel_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKey;

    fn sample_build() -> Build {
        Build::new(
            TenantId::new("acme"),
            UserId::new("u1"),
            ProjectId::new("p1"),
            serde_json::json!({"app": "Todo"}),
        )
    }

    #[test]
    fn new_build_starts_queued_with_no_timestamps() {
        let build = sample_build();
        assert_eq!(build.status, BuildStatus::Queued);
        assert!(build.started_at.is_none());
        assert!(build.completed_at.is_none());
    }

    #[test]
    fn retry_as_new_produces_a_fresh_id_with_the_same_spec() {
        let build = sample_build();
        let retried = build.retry_as_new();
        assert_ne!(build.id, retried.id);
        assert_eq!(retried.status, BuildStatus::Queued);
        assert_eq!(retried.original_spec, build.original_spec);
    }

    #[test]
    fn reset_stage_and_downstream_preserves_earlier_artifacts() {
        let mut build = sample_build();
        let s1 = StageKey::whole(1);
        let s2 = StageKey::whole(2);
        let s3 = StageKey::whole(3);
        build.stage_status.insert(s1, StageStatus::Completed);
        build.stage_status.insert(s2, StageStatus::Failed);
        build.stage_status.insert(s3, StageStatus::Pending);
        build.stage_artifacts.insert(s1, vec![]);
        build.stage_artifacts.insert(s2, vec![]);

        build.reset_stage_and_downstream(s2);

        assert_eq!(build.stage_status[&s1], StageStatus::Completed);
        assert_eq!(build.stage_status[&s2], StageStatus::Pending);
        assert_eq!(build.stage_status[&s3], StageStatus::Pending);
        assert!(build.stage_artifacts.contains_key(&s1));
        assert!(!build.stage_artifacts.contains_key(&s2));
        assert_eq!(build.status, BuildStatus::Running);
    }

    #[test]
    fn error_message_reflects_the_last_log_entry() {
        let mut build = sample_build();
        build.mark_failed(ErrorLogEntry {
            kind: ErrorKind::ProviderPermanent,
            stage: Some(StageKey::whole(3)),
            attempt: Some(1),
            message: "provider rejected the request".to_string(),
            correlation_id: None,
            is_final_failure: true,
            recorded_at: Utc::now(),
        });
        assert_eq!(
            build.error_message(),
            Some("provider rejected the request")
        );
    }
}
