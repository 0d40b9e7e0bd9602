//! Call records: the unit the Cost Tracker aggregates over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BuildId, CorrelationId, ProjectId, TenantId, UserId};

/// Whether a Model Router call ended up using a fallback provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackUsed {
    No,
    Attempted,
    Succeeded,
}

/// The terminal outcome of a single Model Router call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failure,
}

/// One row in the call-record log: exactly one is emitted per terminal Model
/// Router outcome (success or final failure), and zero are emitted for a pure
/// cache hit beyond the hit itself being marked `cached = true` if a record is
/// kept at all for audit purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub correlation_id: CorrelationId,
    pub build_id: BuildId,
    pub tenant: TenantId,
    pub user: UserId,
    pub project: ProjectId,
    pub role: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub cached: bool,
    pub fallback_used: FallbackUsed,
    pub outcome: CallOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl CallRecord {
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
