use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};
use forgepipe_cost::CostError;
use forgepipe_providers::ProviderError;
use forgepipe_ratelimit::RateLimitError;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error(transparent)]
    Cost(#[from] CostError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// Every provider in the chain (primary plus every configured fallback)
    /// was exhausted. Carries the last error observed, since that is almost
    /// always the most actionable one.
    #[error("every provider in the chain was exhausted; last error: {last_error}")]
    ChainExhausted { last_error: ProviderError },
}

impl UserFriendlyError for RouterError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRole(_) => ErrorKind::Validation,
            Self::Cost(e) => e.kind(),
            Self::RateLimit(e) => e.kind(),
            Self::ChainExhausted { last_error } => last_error.kind(),
        }
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cost(e) => e.suggestions(),
            Self::RateLimit(e) => e.suggestions(),
            Self::ChainExhausted { last_error } => last_error.suggestions(),
            Self::UnknownRole(_) => vec!["check the stage table's role name against the configured role map".to_string()],
        }
    }

    fn is_retryable(&self) -> bool {
        self.kind().is_retryable_by_default()
    }

    fn category(&self) -> ErrorCategory {
        self.kind().category()
    }
}
