#![deny(unused)]
//! Reasoning oracle gateway.
//!
//! This crate provides:
//! - An OpenAI-compatible chat-completions client
//! - Construction of that client from the service configuration

pub mod chat_client;

pub use chat_client::{ChatClientConfig, ChatCompletionClient};

use mcp_core::config::OracleConfig;

/// Create the oracle client described by the configuration.
pub fn create_client_from_config(config: &OracleConfig) -> mcp_core::Result<ChatCompletionClient> {
    let mut client_cfg = ChatClientConfig::new(&config.base_url).with_timeout(config.timeout());
    if let Some(model) = &config.model {
        client_cfg = client_cfg.with_model(model);
    }
    if let Some(temp) = config.temperature {
        client_cfg = client_cfg.with_temperature(temp);
    }
    client_cfg.api_key = config.api_key.clone();

    tracing::info!(
        base_url = %config.base_url,
        model = config.model.as_deref().unwrap_or("<server default>"),
        "Configured reasoning oracle"
    );
    ChatCompletionClient::new(client_cfg)
}
