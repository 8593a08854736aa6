use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::BackendError;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: Option<String>,
}

// The one capability the agent adapters need from an LLM: a system prompt
// and a serialized payload in, raw text (expected to be a JSON object) out.
// Adapters depend on this trait so tests can script replies with
// `MockChatBackend` instead of calling a live endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_payload: &str)
    -> Result<String, BackendError>;
}

pub struct ChatClientConfig {
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    timeout: Duration,
}

pub struct ChatClientConfigBuilder {
    config: ChatClientConfig,
}

impl ChatClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ChatClientConfig::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.config.api_key = api_key;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> ChatClientConfig {
        self.config
    }
}

impl Default for ChatClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatClientConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(String::new()),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(90),
        }
    }

    pub fn builder() -> ChatClientConfigBuilder {
        ChatClientConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// OpenAI-compatible `/chat/completions` client (OpenRouter, OpenAI, local servers).
pub struct ChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, BackendError> {
        let api_key = self.config.api_key.expose_secret();
        if api_key.trim().is_empty() {
            return Err(BackendError::MissingCredential);
        }

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_payload }
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.config.temperature
        });

        tracing::debug!(
            model = %self.config.model,
            payload_bytes = user_payload.len(),
            "Sending chat completion request"
        );

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => BackendError::Unauthorized {
                    status: status.as_u16(),
                },
                code => BackendError::Status { status: code, body: text },
            });
        }

        extract_content(&text)
    }
}

/// Pulls the first choice's message content out of a completion envelope.
pub fn extract_content(envelope: &str) -> Result<String, BackendError> {
    let resp: LlmResponse = serde_json::from_str(envelope)
        .map_err(|e| BackendError::InvalidEnvelope(e.to_string()))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(BackendError::EmptyCompletion)
}
