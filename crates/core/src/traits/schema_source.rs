//! Per-service API description source.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::RegistryEntry;

/// Fetches the native API description of a service instance.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the document served at `schema_path` on `instance`.
    async fn fetch(
        &self,
        instance: &RegistryEntry,
        schema_path: &str,
        port_override: Option<u16>,
    ) -> Result<Value>;
}
