//! Capability Registry: logical service names to live addresses.

use std::sync::Arc;

use futures::future::join_all;
use mcp_core::{traits::ServiceDiscovery, types::RegistryEntry, Error, Result};

/// Read-only registry over a discovery backend.
///
/// Never mutates backend state; every lookup goes to the backend (or the
/// cache wrapped around it).
#[derive(Clone)]
pub struct CapabilityRegistry {
    discovery: Arc<dyn ServiceDiscovery>,
}

impl CapabilityRegistry {
    pub fn new(discovery: Arc<dyn ServiceDiscovery>) -> Self {
        Self { discovery }
    }

    /// Logical names of every service with at least one healthy instance, in
    /// catalog order.
    ///
    /// Health lookups run concurrently; any backend failure fails the listing.
    pub async fn list_logical_services(&self) -> Result<Vec<String>> {
        let names = self.discovery.list_services().await.map_err(into_registry)?;

        let lookups = names.into_iter().map(|name| async move {
            let instances = self.discovery.healthy_instances(&name).await;
            (name, instances)
        });

        let mut reachable = Vec::new();
        for (name, instances) in join_all(lookups).await {
            let instances = instances.map_err(into_registry)?;
            if instances.iter().any(|i| i.health.is_healthy()) {
                reachable.push(name);
            } else {
                tracing::debug!(service = %name, "No healthy instance, not listed");
            }
        }
        Ok(reachable)
    }

    /// First healthy instance of `name`, in backend order.
    pub async fn resolve(&self, name: &str) -> Result<RegistryEntry> {
        let instances = self.discovery.healthy_instances(name).await?;

        instances
            .into_iter()
            .find(|i| i.health.is_healthy())
            .ok_or_else(|| Error::not_found(name))
    }

    /// Network address (`host:port`) of the first healthy instance of `name`.
    pub async fn resolve_address(&self, name: &str) -> Result<String> {
        let entry = self.resolve(name).await?;
        Ok(format!("{}:{}", entry.address, entry.port))
    }
}

fn into_registry(e: Error) -> Error {
    match e {
        Error::Registry(_) => e,
        other => Error::registry(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_core::mocks::MockDiscovery;
    use mcp_core::types::HealthStatus;

    #[tokio::test]
    async fn test_resolve_picks_first_healthy() {
        let discovery = MockDiscovery::new()
            .with_instance("identity", "10.0.0.1", 8080, HealthStatus::Warning)
            .with_instance("identity", "10.0.0.2", 8080, HealthStatus::Passing)
            .with_instance("identity", "10.0.0.3", 8080, HealthStatus::Passing);
        let registry = CapabilityRegistry::new(Arc::new(discovery));

        assert_eq!(
            registry.resolve_address("identity").await.unwrap(),
            "10.0.0.2:8080"
        );
    }

    #[tokio::test]
    async fn test_resolve_without_healthy_instance_is_not_found() {
        let discovery = MockDiscovery::new()
            .with_empty_service("identity")
            .with_instance("account", "10.0.0.5", 8080, HealthStatus::Critical);
        let registry = CapabilityRegistry::new(Arc::new(discovery));

        let err = registry.resolve("identity").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref name) if name == "identity"));

        let err = registry.resolve("account").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_skips_services_without_healthy_instances() {
        let discovery = MockDiscovery::new()
            .with_service("identity", "10.0.0.1", 8080)
            .with_empty_service("offline")
            .with_instance("account", "10.0.0.5", 8080, HealthStatus::Critical)
            .with_service("billing", "10.0.0.6", 8080);
        let discovery = Arc::new(discovery);
        let registry = CapabilityRegistry::new(discovery.clone());

        assert_eq!(
            registry.list_logical_services().await.unwrap(),
            vec!["identity", "billing"]
        );
        assert_eq!(discovery.list_calls(), 1);
        assert_eq!(discovery.health_calls(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_registry_error() {
        let registry = CapabilityRegistry::new(Arc::new(MockDiscovery::unreachable()));
        let err = registry.list_logical_services().await.unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }
}
