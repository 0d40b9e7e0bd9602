//! Progress Bus event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ids::{BuildId, CorrelationId};
use crate::stage::StageKey;

/// One event on a build's Progress Bus topic. `seq` is assigned by the bus at
/// publish time and is strictly increasing per build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub build_id: BuildId,
    pub seq: u64,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The payload for each event kind, matching the control-surface envelope's
/// `type` discriminant plus its type-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    Phase {
        stage: StageKey,
        phase: PhasePayload,
    },
    Progress {
        stage: StageKey,
        message: String,
    },
    Status {
        status: String,
    },
    Log {
        stage: Option<StageKey>,
        level: String,
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
        retryable: bool,
        stage: Option<StageKey>,
        attempt: Option<u32>,
        correlation_id: Option<CorrelationId>,
    },
    Pong,
}

/// A stage lifecycle transition, carried inside `EventKind::Phase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhasePayload {
    Started,
    Retrying { attempt: u32, backoff_ms: u64 },
    RetrySuccess { attempt: u32 },
    Completed,
    Failed { is_final_failure: bool },
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_flattened_type_tag() {
        let ev = Event {
            build_id: BuildId::new(),
            seq: 1,
            ts: Utc::now(),
            kind: EventKind::Phase {
                stage: StageKey::whole(1),
                phase: PhasePayload::Started,
            },
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["seq"], 1);
    }
}
