//! Chat-completions client for the reasoning oracle.
//!
//! Speaks the OpenAI-compatible protocol exposed by llama-server and most
//! hosted providers: `POST {base}/v1/chat/completions`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use mcp_core::{
    traits::{ChatMessage, LlmClient, LlmResponse, LlmUsage},
    Error, Result,
};

/// Longest reply preview written to the logs.
const LOG_PREVIEW_BYTES: usize = 500;

/// Configuration for the chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL, without the `/v1/chat/completions` suffix.
    pub base_url: String,
    /// Model name; omitted from the request when unset.
    pub model: Option<String>,
    /// Bearer token, when the endpoint requires one.
    pub api_key: Option<Secret<String>>,
    /// Whole-call timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ChatClientConfig {
    /// Config for a local llama-server style endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: None,
            api_key: None,
            timeout: Duration::from_secs(60),
            temperature: None,
        }
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key.into()));
        self
    }

    /// Set the whole-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Reasoning-oracle client over the chat-completions protocol.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: ChatClientConfig,
    url: String,
}

impl ChatCompletionClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::oracle(format!("Failed to build oracle client: {}", e)))?;
        let url = format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            config,
            url,
        })
    }

    /// Endpoint the client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: self.config.model.as_deref(),
            messages,
            temperature: self.config.temperature,
        };

        tracing::info!(
            url = %self.url,
            messages = messages.len(),
            "Calling reasoning oracle"
        );

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::oracle(format!(
                    "oracle timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            } else {
                Error::oracle(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| Error::oracle(format!("failed to read reply: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %preview(&raw_body), "Oracle API error");
            return Err(Error::oracle(format!("API error {}: {}", status, raw_body)));
        }

        let parsed: ChatResponse = serde_json::from_str(&raw_body).map_err(|e| {
            Error::oracle(format!(
                "unexpected reply shape: {}. Body: {}",
                e,
                preview(&raw_body)
            ))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::oracle("no choices in reply"))?;
        let content = choice.message.content.unwrap_or_default();

        tracing::debug!(reply_len = content.len(), preview = %preview(&content), "Oracle replied");

        Ok(LlmResponse {
            content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage.unwrap_or_default(),
        })
    }
}

/// Prefix of `s` no longer than [`LOG_PREVIEW_BYTES`], cut on a char boundary.
fn preview(s: &str) -> &str {
    if s.len() <= LOG_PREVIEW_BYTES {
        return s;
    }
    let mut end = LOG_PREVIEW_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
