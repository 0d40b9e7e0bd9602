//! Provider adapters: a single trait seam the Model Router calls through,
//! plus a registry and a handful of concrete implementations.

pub mod backend;
pub mod error;
pub mod http_backend;
pub mod mock;
pub mod registry;
pub mod types;

pub use backend::{ProbeOutcome, ProviderBackend};
pub use error::ProviderError;
pub use http_backend::{HttpBackend, HttpBackendConfig};
pub use mock::{MockBackend, ScriptedOutcome};
pub use registry::ProviderRegistry;
pub use types::{Message, ProviderRequest, ProviderResponse, Role};
