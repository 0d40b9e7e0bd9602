//! Holds every configured provider adapter. Boot validation here is
//! deliberately permissive: a provider that fails to construct (bad
//! credential, unreachable endpoint) is logged and left out of the registry
//! rather than aborting startup, so the rest of the pipeline still runs with
//! whatever providers did come up. Callers asking for a missing provider get
//! [`ProviderError::Unknown`], which the Model Router treats the same as any
//! other provider-unavailable condition.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::backend::ProviderBackend;
use crate::error::ProviderError;

#[derive(Default)]
pub struct ProviderRegistry {
    backends: BTreeMap<String, Arc<dyn ProviderBackend>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn ProviderBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Record that a provider was requested by configuration but could not
    /// be constructed, so it is simply absent from `get` rather than
    /// present-but-broken.
    pub fn note_construction_failure(&self, provider: &str, reason: &str) {
        warn!(
            target: "forgepipe::providers",
            provider,
            reason,
            "provider disabled at boot; stages requiring it will fail over or fail"
        );
    }

    pub fn get(&self, provider: &str) -> Result<Arc<dyn ProviderBackend>, ProviderError> {
        self.backends
            .get(provider)
            .cloned()
            .ok_or_else(|| ProviderError::Unknown(provider.to_string()))
    }

    pub fn is_registered(&self, provider: &str) -> bool {
        self.backends.contains_key(provider)
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn get_returns_unknown_for_an_unregistered_provider() {
        let registry = ProviderRegistry::new();
        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, ProviderError::Unknown(_)));
    }

    #[test]
    fn registered_backends_are_retrievable_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockBackend::always_succeeds("acme-llm", "ok")));
        assert!(registry.is_registered("acme-llm"));
        assert!(registry.get("acme-llm").is_ok());
    }
}
