//! The composed error taxonomy.
//!
//! Every subsystem in the pipeline classifies its failures into this single
//! set of kinds. The Pipeline Orchestrator's retry loop reads
//! [`ErrorKind::is_retryable`] to decide whether to attempt a stage again; it
//! never inspects an error's `Display` text to make that call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The taxonomy described in the error-handling design: each variant answers
/// "is this retryable" on its own, without the caller needing outside context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    MissingInputArtifact,
    ArtifactWriteError,
    ProviderTransient,
    ProviderPermanent,
    ProviderUnavailable,
    Timeout,
    CostDenied,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether a failure of this kind is, in principle, worth retrying.
    ///
    /// `ArtifactWriteError` and `Timeout` are "per-case"/"conditional" in the
    /// taxonomy table: an artifact write failure is retryable unless it stems
    /// from a validation problem with the content itself, and a timeout is
    /// retryable on every attempt except the last. Both of those finer
    /// distinctions are made by the caller (the Orchestrator's attempt loop
    /// knows which attempt it is on); this method gives the kind's default.
    #[must_use]
    pub const fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            Self::ArtifactWriteError
                | Self::ProviderTransient
                | Self::ProviderUnavailable
                | Self::Timeout
        )
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation | Self::MissingInputArtifact => ErrorCategory::ClientInput,
            Self::Unauthorized | Self::Forbidden => ErrorCategory::Authorization,
            Self::NotFound => ErrorCategory::NotFound,
            Self::ArtifactWriteError | Self::Internal => ErrorCategory::Internal,
            Self::ProviderTransient | Self::ProviderPermanent | Self::ProviderUnavailable => {
                ErrorCategory::Provider
            }
            Self::Timeout => ErrorCategory::Timeout,
            Self::CostDenied => ErrorCategory::Budget,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::MissingInputArtifact => "missing_input_artifact",
            Self::ArtifactWriteError => "artifact_write_error",
            Self::ProviderTransient => "provider_transient",
            Self::ProviderPermanent => "provider_permanent",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Timeout => "timeout",
            Self::CostDenied => "cost_denied",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// Coarse category used for user-facing grouping and for deciding whether a
/// message is safe to hand back to an end user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ClientInput,
    Authorization,
    NotFound,
    Internal,
    Provider,
    Timeout,
    Budget,
    Cancelled,
}

/// Implemented by every concrete error type so the Orchestrator's retry loop
/// and the Control API's error payload (`{kind, message, retryable, ...}`)
/// never need to parse a `Display` string to decide what to do with a
/// failure.
pub trait UserFriendlyError {
    /// The taxonomy kind this failure falls under.
    fn kind(&self) -> ErrorKind;

    /// A short, operator-safe message: no secrets, no stack traces, no
    /// credential fragments.
    fn user_message(&self) -> String;

    /// Actionable follow-ups a client or operator could take.
    fn suggestions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Convenience: whether this failure is retryable, given this kind's
    /// default.
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable_by_default()
    }

    fn category(&self) -> ErrorCategory {
        self.kind().category()
    }
}

/// The top-level composed error type. Subsystem error types convert into this
/// one via `#[from]`; each subsystem crate is responsible for classifying its
/// own failures into the right [`ErrorKind`] at the point the error is
/// constructed, not downstream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing input artifact: {0}")]
    MissingInputArtifact(String),

    #[error("artifact write failed: {0}")]
    ArtifactWriteError(String),

    #[error("provider error (transient): {0}")]
    ProviderTransient(String),

    #[error("provider error (permanent): {0}")]
    ProviderPermanent(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("cost limit exceeded: {0}")]
    CostDenied(String),

    #[error("build cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl UserFriendlyError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MissingInputArtifact(_) => ErrorKind::MissingInputArtifact,
            Self::ArtifactWriteError(_) => ErrorKind::ArtifactWriteError,
            Self::ProviderTransient(_) => ErrorKind::ProviderTransient,
            Self::ProviderPermanent(_) => ErrorKind::ProviderPermanent,
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::CostDenied(_) => ErrorKind::CostDenied,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    fn user_message(&self) -> String {
        // `Display` already avoids embedding secrets for every variant above;
        // redaction of arbitrary provider payloads happens at the point a
        // provider adapter constructs a `ProviderTransient`/`ProviderPermanent`
        // value, not here.
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self.kind() {
            ErrorKind::ProviderTransient | ErrorKind::ProviderUnavailable | ErrorKind::Timeout => {
                vec!["retry the stage".to_string()]
            }
            ErrorKind::CostDenied => vec!["raise the relevant budget or wait for the window to roll over".to_string()],
            ErrorKind::MissingInputArtifact => {
                vec!["retry the upstream stage that produces this artifact".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_the_taxonomy_table() {
        assert!(ErrorKind::ProviderTransient.is_retryable_by_default());
        assert!(ErrorKind::ProviderUnavailable.is_retryable_by_default());
        assert!(ErrorKind::Timeout.is_retryable_by_default());
        assert!(!ErrorKind::ProviderPermanent.is_retryable_by_default());
        assert!(!ErrorKind::Validation.is_retryable_by_default());
        assert!(!ErrorKind::CostDenied.is_retryable_by_default());
        assert!(!ErrorKind::Cancelled.is_retryable_by_default());
    }

    #[test]
    fn error_kind_roundtrips_through_the_friendly_trait() {
        let err = Error::CostDenied("per-build limit reached".to_string());
        assert_eq!(err.kind(), ErrorKind::CostDenied);
        assert!(!err.is_retryable());
        assert!(!err.suggestions().is_empty());
    }
}
