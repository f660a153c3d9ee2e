//! Discovery backend traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RegistryEntry;

/// Read-only view of the discovery backend.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Every logical service name the backend knows about.
    async fn list_services(&self) -> Result<Vec<String>>;

    /// Instances of `name` currently marked healthy, in backend order.
    async fn healthy_instances(&self, name: &str) -> Result<Vec<RegistryEntry>>;
}
