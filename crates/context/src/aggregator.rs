//! Context aggregator: the uniform description of every available service.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use mcp_core::{
    config::{ContextConfig, ServiceDocConfig},
    traits::SchemaSource,
    types::{CapabilityContext, CapabilityDescriptor},
    Result,
};
use mcp_discovery::CapabilityRegistry;

use crate::harmonizer::Harmonizer;

/// Builds a fresh [`CapabilityContext`] on demand.
///
/// Only services with a configured description path are considered. Per-service
/// failures (no healthy instance, fetch error, malformed document) drop that
/// service from the result instead of failing the whole build.
pub struct ContextAggregator {
    registry: CapabilityRegistry,
    source: Arc<dyn SchemaSource>,
    harmonizer: Harmonizer,
    services: HashMap<String, ServiceDocConfig>,
}

impl ContextAggregator {
    pub fn new(
        registry: CapabilityRegistry,
        source: Arc<dyn SchemaSource>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            registry,
            source,
            harmonizer: Harmonizer::new(config.max_schema_depth),
            services: config.services.clone(),
        }
    }

    /// Reachable services that have a configured description path, sorted.
    pub async fn available_services(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .registry
            .list_logical_services()
            .await?
            .into_iter()
            .filter(|name| self.services.contains_key(name))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Harmonized description of every available service.
    ///
    /// Fails only when the registry itself cannot be listed.
    pub async fn build_context(&self) -> Result<CapabilityContext> {
        let names = self.available_services().await?;

        let fetches = names.iter().map(|name| async move {
            let outcome = self.fetch_descriptor(name).await;
            (name, outcome)
        });

        let mut context = CapabilityContext::new();
        for (name, outcome) in join_all(fetches).await {
            match outcome {
                Ok(Some(descriptor)) => {
                    context.insert(name.clone(), descriptor);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(service = %name, error = %e, "Skipping service: capability fetch failed");
                }
            }
        }

        tracing::info!(
            available = names.len(),
            described = context.len(),
            "Built capability context"
        );
        Ok(context)
    }

    /// Harmonized description of a single service.
    ///
    /// Returns `Ok(None)` when the service has no configured description path.
    pub async fn describe(&self, name: &str) -> Result<Option<CapabilityDescriptor>> {
        self.fetch_descriptor(name).await
    }

    async fn fetch_descriptor(&self, name: &str) -> Result<Option<CapabilityDescriptor>> {
        let Some(doc_config) = self.services.get(name) else {
            return Ok(None);
        };

        let instance = self.registry.resolve(name).await?;
        let document = self
            .source
            .fetch(&instance, &doc_config.schema_path, doc_config.port)
            .await?;
        let descriptor = self.harmonizer.harmonize(&document)?;

        tracing::debug!(
            service = %name,
            endpoints = descriptor.endpoints.len(),
            schemas = descriptor.schemas.len(),
            "Harmonized service description"
        );
        Ok(Some(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_core::mocks::{MockDiscovery, MockSchemaSource};
    use mcp_core::Error;
    use serde_json::json;

    fn doc(title: &str) -> serde_json::Value {
        json!({
            "info": {"title": title, "description": format!("{} service", title)},
            "paths": {"/ping": {"get": {"summary": "ping"}}}
        })
    }

    fn config_for(names: &[&str]) -> ContextConfig {
        ContextConfig {
            services: names
                .iter()
                .map(|n| {
                    (
                        n.to_string(),
                        ServiceDocConfig {
                            schema_path: "/swagger/doc.json".into(),
                            port: None,
                        },
                    )
                })
                .collect(),
            ..ContextConfig::default()
        }
    }

    #[tokio::test]
    async fn test_partial_failures_are_skipped() {
        // Five configured services; two fail in different ways.
        let discovery = MockDiscovery::new()
            .with_service("identity", "10.0.0.1", 8080)
            .with_service("account", "10.0.0.2", 8080)
            .with_service("billing", "10.0.0.3", 8080)
            .with_service("broken", "10.0.0.4", 8080)
            .with_empty_service("offline")
            .with_service("consul", "10.0.0.9", 8500);
        let source = MockSchemaSource::new()
            .with_document("identity", doc("identity"))
            .with_document("account", doc("account"))
            .with_document("billing", doc("billing"))
            .with_document("broken", json!({"info": {"title": "broken"}}));

        let aggregator = ContextAggregator::new(
            CapabilityRegistry::new(Arc::new(discovery)),
            Arc::new(source),
            &config_for(&["identity", "account", "billing", "broken", "offline"]),
        );

        let context = aggregator.build_context().await.unwrap();
        let names: Vec<_> = context.keys().cloned().collect();
        assert_eq!(names, vec!["account", "billing", "identity"]);
    }

    #[tokio::test]
    async fn test_unconfigured_services_are_filtered() {
        let discovery = MockDiscovery::new()
            .with_service("identity", "10.0.0.1", 8080)
            .with_service("consul", "10.0.0.9", 8500);
        let source = Arc::new(MockSchemaSource::new().with_document("identity", doc("identity")));
        let aggregator = ContextAggregator::new(
            CapabilityRegistry::new(Arc::new(discovery)),
            source.clone(),
            &config_for(&["identity", "account"]),
        );

        assert_eq!(aggregator.available_services().await.unwrap(), vec!["identity"]);
        assert_eq!(aggregator.build_context().await.unwrap().len(), 1);
        assert_eq!(source.fetch_calls(), 1);
        assert!(aggregator.describe("consul").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_services_without_healthy_instance_are_not_available() {
        let discovery = MockDiscovery::new()
            .with_service("identity", "10.0.0.1", 8080)
            .with_empty_service("offline");
        let source = Arc::new(MockSchemaSource::new().with_document("identity", doc("identity")));
        let aggregator = ContextAggregator::new(
            CapabilityRegistry::new(Arc::new(discovery)),
            source.clone(),
            &config_for(&["identity", "offline"]),
        );

        assert_eq!(aggregator.available_services().await.unwrap(), vec!["identity"]);
        aggregator.build_context().await.unwrap();
        assert_eq!(source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let aggregator = ContextAggregator::new(
            CapabilityRegistry::new(Arc::new(MockDiscovery::unreachable())),
            Arc::new(MockSchemaSource::new()),
            &config_for(&["identity"]),
        );
        let err = aggregator.build_context().await.unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[tokio::test]
    async fn test_describe_surfaces_errors() {
        let discovery = MockDiscovery::new().with_empty_service("identity");
        let aggregator = ContextAggregator::new(
            CapabilityRegistry::new(Arc::new(discovery)),
            Arc::new(MockSchemaSource::new()),
            &config_for(&["identity"]),
        );
        let err = aggregator.describe("identity").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
