//! The adapter seam every provider implementation sits behind.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResponse};

/// A snapshot of a provider's reachability, independent of the Rate
/// Limiter's circuit breaker state (which tracks *this process'* recent call
/// history; a health probe asks the provider directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
}

/// Implemented once per provider integration. The Model Router only ever
/// talks to this trait, never to a concrete backend type, so a new provider
/// can be added without touching routing logic.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// The name this backend is registered under (e.g. `"acme-llm"`).
    fn name(&self) -> &str;

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// A cheap reachability check, used at boot and by periodic health
    /// sweeps. The default assumes reachable; adapters with a real health
    /// endpoint should override this.
    async fn health_probe(&self) -> ProbeOutcome {
        ProbeOutcome::Reachable
    }
}
