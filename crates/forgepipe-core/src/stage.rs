//! Stage descriptors and the numeric keys that order them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// A stage's position in the pipeline. Stored as tenths so that fractional
/// sub-stages (`1.5`, `3.5`) sort exactly between their neighbors without the
/// rounding hazards of comparing `f64` directly. `StageKey` is `Ord`/`Hash`,
/// which an `f64` newtype could not be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageKey(i64);

impl StageKey {
    /// Build a stage key from a whole number, e.g. `StageKey::whole(3)` for stage `3`.
    #[must_use]
    pub const fn whole(n: i64) -> Self {
        Self(n * 10)
    }

    /// Build a stage key from a whole number and a single fractional digit,
    /// e.g. `StageKey::sub(1, 5)` for stage `1.5`.
    #[must_use]
    pub const fn sub(n: i64, tenth: i64) -> Self {
        Self(n * 10 + tenth)
    }

    #[must_use]
    pub const fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}", self.0 / 10)
        } else {
            write!(f, "{:.1}", self.as_f64())
        }
    }
}

/// The well-known stage keys named in the pipeline's data model. Additional
/// sub-stages can be introduced by any `StageKey::sub` value; nothing in the
/// orchestrator hard-codes this list beyond using it to build the default
/// stage table (see `forgepipe-stages`).
pub mod well_known {
    use super::StageKey;

    pub const CLARIFICATION: StageKey = StageKey::whole(0);
    pub const NORMALIZATION: StageKey = StageKey::whole(1);
    pub const REFINEMENT: StageKey = StageKey::sub(1, 5);
    pub const DOCUMENTATION: StageKey = StageKey::whole(2);
    pub const SCHEMA_GENERATION: StageKey = StageKey::whole(3);
    pub const STRUCTURAL_VALIDATION: StageKey = StageKey::sub(3, 5);
    pub const FILE_STRUCTURE_PLANNING: StageKey = StageKey::whole(4);
    pub const EMPTY_FILE_SCAFFOLDING: StageKey = StageKey::whole(5);
    pub const CODE_GENERATION: StageKey = StageKey::whole(6);
    pub const REPO_PUBLICATION: StageKey = StageKey::whole(7);
    pub const CLOUD_DEPLOYMENT: StageKey = StageKey::whole(8);
    pub const FINALIZATION: StageKey = StageKey::whole(9);
}

/// Per-stage lifecycle state, as tracked in a `Build`'s stage status map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Default retry budget: the initial attempt plus two retries.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Default backoff schedule between stage attempts.
#[must_use]
pub fn default_backoff_schedule() -> Vec<Duration> {
    vec![
        Duration::from_millis(0),
        Duration::from_millis(500),
        Duration::from_millis(1500),
    ]
}

/// A stage's static description: what it needs, what it produces, how it is
/// run, and its retry/timeout budget. The Stage Router (`forgepipe-stages`)
/// turns one of these plus a `StageHandler` implementation into a runnable
/// unit that the Pipeline Orchestrator drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub key: StageKey,
    pub name: String,
    pub required_inputs: BTreeSet<String>,
    pub produced_outputs: BTreeSet<String>,
    pub timeout: Duration,
    pub retry_budget: u32,
    pub ai_required: bool,
}

impl StageDescriptor {
    #[must_use]
    pub fn new(key: StageKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            required_inputs: BTreeSet::new(),
            produced_outputs: BTreeSet::new(),
            timeout: Duration::from_secs(120),
            retry_budget: DEFAULT_RETRY_BUDGET,
            ai_required: true,
        }
    }

    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = &'static str>) -> Self {
        self.required_inputs = inputs.into_iter().map(str::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = &'static str>) -> Self {
        self.produced_outputs = outputs.into_iter().map(str::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    #[must_use]
    pub fn ai_required(mut self, ai_required: bool) -> Self {
        self.ai_required = ai_required;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_stages_sort_between_their_neighbors() {
        let one = StageKey::whole(1);
        let one_half = StageKey::sub(1, 5);
        let two = StageKey::whole(2);
        assert!(one < one_half);
        assert!(one_half < two);
    }

    #[test]
    fn display_drops_trailing_zero_for_whole_stages() {
        assert_eq!(StageKey::whole(3).to_string(), "3");
        assert_eq!(StageKey::sub(3, 5).to_string(), "3.5");
    }

    #[test]
    fn well_known_stages_are_in_ascending_order() {
        use well_known::*;
        let ordered = [
            CLARIFICATION,
            NORMALIZATION,
            REFINEMENT,
            DOCUMENTATION,
            SCHEMA_GENERATION,
            STRUCTURAL_VALIDATION,
            FILE_STRUCTURE_PLANNING,
            EMPTY_FILE_SCAFFOLDING,
            CODE_GENERATION,
            REPO_PUBLICATION,
            CLOUD_DEPLOYMENT,
            FINALIZATION,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{pair:?} not ascending");
        }
    }
}
