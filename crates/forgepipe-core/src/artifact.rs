//! Artifact naming and categorization.
//!
//! The actual byte storage lives in `forgepipe-artifacts`; this module holds
//! the pure, synchronous naming rules so both the store and the orchestrator
//! agree on them without a dependency cycle.

use serde::{Deserialize, Serialize};

use crate::stage::StageKey;

/// The three sub-directories artifacts are bucketed into, per the filename
/// convention: `*.json` files go to `specs/` unless the name starts with
/// `docs_`, markdown goes to `docs/`, everything else (generated source) goes
/// to `code/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCategory {
    Specs,
    Docs,
    Code,
}

impl ArtifactCategory {
    #[must_use]
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Specs => "specs",
            Self::Docs => "docs",
            Self::Code => "code",
        }
    }

    /// Classify a filename by the convention above.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        if name.starts_with("docs_") || name.ends_with(".md") {
            Self::Docs
        } else if name.ends_with(".json") {
            Self::Specs
        } else {
            Self::Code
        }
    }
}

/// A pointer to an artifact that has been written: enough to look it back up
/// without re-reading its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub category: ArtifactCategory,
    pub produced_by_stage: StageKey,
    /// blake3 content hash, hex-encoded, for happens-before checks and dedup.
    pub content_hash: String,
    pub byte_len: u64,
}
