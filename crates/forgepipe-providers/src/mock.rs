//! An in-memory backend for tests and for the simulated-provider demo mode:
//! no network calls, scripted responses and failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{ProbeOutcome, ProviderBackend};
use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResponse};

pub enum ScriptedOutcome {
    Respond(String),
    Fail(ProviderError),
}

/// Replays a fixed script of outcomes in order, one per `invoke` call;
/// repeats the last entry once the script is exhausted.
pub struct MockBackend {
    name: String,
    script: Mutex<Vec<ScriptedOutcome>>,
    cursor: AtomicUsize,
}

impl MockBackend {
    #[must_use]
    pub fn new(name: impl Into<String>, script: Vec<ScriptedOutcome>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn always_succeeds(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self::new(name, vec![ScriptedOutcome::Respond(response.into())])
    }
}

#[async_trait]
impl ProviderBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let script = self.script.lock().expect("mock script mutex poisoned");
        if script.is_empty() {
            return Err(ProviderError::Misconfiguration {
                provider: self.name.clone(),
                message: "mock backend has an empty script".to_string(),
            });
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
        match &script[index] {
            ScriptedOutcome::Respond(text) => Ok(ProviderResponse {
                raw_response: text.clone(),
                provider: self.name.clone(),
                model_used: request.model,
                input_tokens: 10,
                output_tokens: 20,
            }),
            ScriptedOutcome::Fail(err) => Err(clone_error(err, &self.name)),
        }
    }

    async fn health_probe(&self) -> ProbeOutcome {
        ProbeOutcome::Reachable
    }
}

/// `ProviderError` does not derive `Clone` (its variants borrow no shared
/// state, but re-deriving would widen the public surface for no real gain);
/// rebuild an equivalent value for replay instead.
fn clone_error(err: &ProviderError, provider: &str) -> ProviderError {
    match err {
        ProviderError::Transport { message, .. } => ProviderError::Transport {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Auth { message, .. } => ProviderError::Auth {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Quota { .. } => ProviderError::Quota {
            provider: provider.to_string(),
        },
        ProviderError::Outage { message, .. } => ProviderError::Outage {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Timeout { elapsed_ms, .. } => ProviderError::Timeout {
            provider: provider.to_string(),
            elapsed_ms: *elapsed_ms,
        },
        ProviderError::MalformedResponse { message, .. } => ProviderError::MalformedResponse {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Unknown(_) => ProviderError::Unknown(provider.to_string()),
        ProviderError::Misconfiguration { message, .. } => ProviderError::Misconfiguration {
            provider: provider.to_string(),
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::time::Duration;

    fn req() -> ProviderRequest {
        ProviderRequest::new("mock-model", vec![Message::user("hi")], Duration::from_secs(5))
    }

    #[tokio::test]
    async fn replays_scripted_success() {
        let backend = MockBackend::always_succeeds("mock", "hello back");
        let result = backend.invoke(req()).await.unwrap();
        assert_eq!(result.raw_response, "hello back");
    }

    #[tokio::test]
    async fn replays_scripted_failure_then_success() {
        let backend = MockBackend::new(
            "mock",
            vec![
                ScriptedOutcome::Fail(ProviderError::Outage {
                    provider: "mock".into(),
                    message: "down".into(),
                }),
                ScriptedOutcome::Respond("recovered".into()),
            ],
        );
        assert!(backend.invoke(req()).await.is_err());
        let second = backend.invoke(req()).await.unwrap();
        assert_eq!(second.raw_response, "recovered");
    }
}
