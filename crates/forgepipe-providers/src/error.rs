//! Provider failures, classified into the shared taxonomy at the point they
//! are constructed -- a backend never hands the router a raw status code to
//! interpret later.

use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, reset mid-stream: worth retrying,
    /// same provider.
    #[error("transport error calling {provider}: {message}")]
    Transport { provider: String, message: String },

    /// 401/403 or a missing credential. Retrying will not help.
    #[error("authentication failed for {provider}: {message}")]
    Auth { provider: String, message: String },

    /// 429. Retryable, but the caller should back off or fail over.
    #[error("{provider} rate limit exceeded")]
    Quota { provider: String },

    /// 5xx from the provider itself.
    #[error("{provider} reported a service outage: {message}")]
    Outage { provider: String, message: String },

    #[error("call to {provider} timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },

    /// The response body did not parse, or was missing required content.
    /// Treated as permanent: retrying the same request is unlikely to fix a
    /// provider's malformed output.
    #[error("malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("provider '{0}' is not registered")]
    Unknown(String),

    #[error("provider '{provider}' is misconfigured: {message}")]
    Misconfiguration { provider: String, message: String },
}

impl ProviderError {
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Transport { provider, .. }
            | Self::Auth { provider, .. }
            | Self::Quota { provider }
            | Self::Outage { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::Misconfiguration { provider, .. } => Some(provider),
            Self::Unknown(_) => None,
        }
    }

    /// Classify an HTTP status code from a provider response into the right
    /// variant. `body_excerpt` should already be redacted/truncated by the
    /// caller before being stored.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, body_excerpt: &str) -> Self {
        match status {
            401 | 403 => Self::Auth {
                provider: provider.to_string(),
                message: body_excerpt.to_string(),
            },
            429 => Self::Quota {
                provider: provider.to_string(),
            },
            500..=599 => Self::Outage {
                provider: provider.to_string(),
                message: body_excerpt.to_string(),
            },
            _ => Self::Transport {
                provider: provider.to_string(),
                message: format!("unexpected status {status}: {body_excerpt}"),
            },
        }
    }
}

impl UserFriendlyError for ProviderError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Outage { .. } | Self::Quota { .. } => {
                ErrorKind::ProviderTransient
            }
            Self::Auth { .. } | Self::MalformedResponse { .. } | Self::Misconfiguration { .. } => {
                ErrorKind::ProviderPermanent
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Unknown(_) => ErrorKind::ProviderUnavailable,
        }
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Auth { provider, .. } => {
                vec![format!("check the API credential configured for {provider}")]
            }
            Self::Misconfiguration { provider, .. } => {
                vec![format!("fix {provider}'s configuration entry")]
            }
            Self::Quota { .. } => vec!["retry after a short backoff, or fail over to another provider".into()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        self.kind().category()
    }
}
