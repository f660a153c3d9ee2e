//! HTTP source for per-service API descriptions.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use mcp_core::{traits::SchemaSource, types::RegistryEntry, Error, Result};

/// Fetches API descriptions with a plain `GET` against the instance.
pub struct HttpSchemaSource {
    client: reqwest::Client,
}

impl HttpSchemaSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build schema client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch(
        &self,
        instance: &RegistryEntry,
        schema_path: &str,
        port_override: Option<u16>,
    ) -> Result<Value> {
        let url = format!("{}{}", instance.base_url(port_override), schema_path);
        tracing::debug!(service = %instance.logical_name, url = %url, "Fetching API description");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::schema(format!("failed to fetch {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::schema(format!("{} returned {}", url, status)));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| Error::schema(format!("{} is not valid JSON: {}", url, e)))
    }
}
