use std::time::Duration;

use forgepipe_core::call_record::FallbackUsed;
use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
use forgepipe_providers::Message;

/// Either side of the router's two entry points: call a specific provider
/// and model directly, or resolve a role through the configured role map.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    Explicit { provider: String, model: String },
    Role(String),
}

#[derive(Debug, Clone)]
pub struct RouteContext {
    pub build_id: BuildId,
    pub tenant: TenantId,
    pub user: UserId,
    pub project: ProjectId,
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub target: RouteTarget,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub streaming: bool,
}

impl RouteRequest {
    #[must_use]
    pub fn for_role(role: impl Into<String>, messages: Vec<Message>, timeout: Duration) -> Self {
        Self {
            target: RouteTarget::Role(role.into()),
            messages,
            temperature: 0.2,
            max_tokens: 4096,
            timeout,
            streaming: false,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub raw_response: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub cached: bool,
    pub fallback_used: FallbackUsed,
    pub attempts: u32,
}
