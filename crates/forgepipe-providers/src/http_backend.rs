//! A generic HTTP backend speaking an Anthropic-style Messages API: a system
//! prompt plus a flat array of user/assistant turns, `POST`ed as JSON. Most
//! hosted chat-completion APIs are a close enough cousin of this shape that
//! new providers typically just need a different base URL, auth header, and
//! response envelope -- callers needing a genuinely different wire format
//! implement [`ProviderBackend`] directly instead of reusing this adapter.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{ProbeOutcome, ProviderBackend};
use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResponse, Role};

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub auth_header: String,
    pub extra_headers: Vec<(String, String)>,
}

pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// # Errors
    /// Returns [`ProviderError::Misconfiguration`] if the underlying HTTP
    /// client cannot be built (e.g. an invalid TLS configuration).
    pub fn new(config: HttpBackendConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Misconfiguration {
                provider: config.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn convert_messages(messages: &[crate::types::Message]) -> (Option<String>, Vec<WireMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut turns = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => {
                    let entry = system_prompt.get_or_insert_with(String::new);
                    if !entry.is_empty() {
                        entry.push_str("\n\n");
                    }
                    entry.push_str(&msg.content);
                }
                Role::User => turns.push(WireMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
                Role::Assistant => turns.push(WireMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }
        (system_prompt, turns)
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<WireContentBlock>,
    usage: Option<WireUsage>,
}

#[async_trait]
impl ProviderBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let (system, messages) = Self::convert_messages(&request.messages);
        let body = WireRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
        };

        debug!(
            target: "forgepipe::providers",
            provider = %self.config.name,
            model = %request.model,
            "invoking provider"
        );

        let mut http_request = self
            .client
            .post(&self.config.base_url)
            .header(&self.config.auth_header, &self.config.api_key)
            .header("content-type", "application/json");
        for (key, value) in &self.config.extra_headers {
            http_request = http_request.header(key, value);
        }

        let started = Instant::now();
        let response = http_request
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        provider: self.config.name.clone(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    ProviderError::Transport {
                        provider: self.config.name.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let excerpt: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(ProviderError::from_status(
                &self.config.name,
                status.as_u16(),
                &excerpt,
            ));
        }

        let parsed: WireResponse = response.json().await.map_err(|e| ProviderError::MalformedResponse {
            provider: self.config.name.clone(),
            message: e.to_string(),
        })?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.clone())
            .collect();

        if text.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: self.config.name.clone(),
                message: "response contained no text content".to_string(),
            });
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        Ok(ProviderResponse {
            raw_response: text,
            provider: self.config.name.clone(),
            model_used: request.model,
            input_tokens,
            output_tokens,
        })
    }

    async fn health_probe(&self) -> ProbeOutcome {
        match self.client.head(&self.config.base_url).send().await {
            Ok(_) => ProbeOutcome::Reachable,
            Err(_) => ProbeOutcome::Unreachable,
        }
    }
}
