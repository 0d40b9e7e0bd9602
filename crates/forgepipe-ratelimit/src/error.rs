//! Errors surfaced by admission control.

use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("provider '{provider}' is unavailable (circuit open)")]
    ProviderUnavailable { provider: String },
}

impl UserFriendlyError for RateLimitError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ProviderUnavailable
    }

    fn user_message(&self) -> String {
        match self {
            Self::ProviderUnavailable { provider } => {
                format!("{provider} is temporarily unavailable; it will be retried after its cooldown elapses")
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Wait for the circuit's cooldown to elapse, or configure a fallback chain.".into()]
    }

    fn is_retryable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Provider
    }
}
