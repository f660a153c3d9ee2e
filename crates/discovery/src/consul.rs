//! Consul discovery backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use mcp_core::{
    traits::ServiceDiscovery,
    types::{HealthStatus, RegistryEntry},
    Error, Result,
};

/// Consul HTTP API client.
///
/// Stateless apart from the pooled HTTP client, so one instance is shared by
/// every concurrent request.
pub struct ConsulDiscovery {
    client: reqwest::Client,
    base_url: String,
    default_port: u16,
}

impl ConsulDiscovery {
    /// Create a client for the agent at `base_url` (e.g. `http://consul:8500`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::registry(format!("Failed to build Consul client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_port: 8080,
        })
    }

    /// Port assumed for instances registered without one.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Register a service instance with the local agent.
    pub async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.base_url);
        let resp = self
            .client
            .put(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| Error::registry(format!("Consul registration failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::registry(format!(
                "Consul registration rejected ({}): {}",
                status, body
            )));
        }

        tracing::info!(service_id = %registration.id, name = %registration.name, "Registered with Consul");
        Ok(())
    }

    /// Remove a previously registered instance.
    pub async fn deregister(&self, service_id: &str) -> Result<()> {
        let url = format!("{}/v1/agent/service/deregister/{}", self.base_url, service_id);
        let resp = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|e| Error::registry(format!("Consul deregistration failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::registry(format!(
                "Consul deregistration rejected ({})",
                resp.status()
            )));
        }

        tracing::info!(service_id = %service_id, "Deregistered from Consul");
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::registry(format!("Consul unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::registry(format!(
                "Consul returned {} for {}: {}",
                status, url, body
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::registry(format!("Malformed Consul response: {}", e)))
    }

    fn to_entry(&self, name: &str, raw: HealthServiceEntry) -> RegistryEntry {
        let address = if raw.service.address.is_empty() {
            raw.node.address
        } else {
            raw.service.address
        };
        let port = if raw.service.port == 0 {
            self.default_port
        } else {
            raw.service.port
        };

        RegistryEntry {
            logical_name: name.to_string(),
            address,
            port,
            health: aggregate_health(&raw.checks),
        }
    }
}

/// Worst status across an instance's checks. No checks counts as passing.
fn aggregate_health(checks: &[HealthCheck]) -> HealthStatus {
    checks
        .iter()
        .map(|c| HealthStatus::parse(&c.status))
        .fold(HealthStatus::Passing, |worst, s| match (worst, s) {
            (HealthStatus::Critical, _) | (_, HealthStatus::Critical) => HealthStatus::Critical,
            (HealthStatus::Warning, _) | (_, HealthStatus::Warning) => HealthStatus::Warning,
            _ => HealthStatus::Passing,
        })
}

#[async_trait]
impl ServiceDiscovery for ConsulDiscovery {
    async fn list_services(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/catalog/services", self.base_url);
        let catalog: Map<String, Value> = self.get_json(&url).await?;
        tracing::debug!(count = catalog.len(), "Fetched Consul catalog");
        Ok(catalog.into_iter().map(|(name, _)| name).collect())
    }

    async fn healthy_instances(&self, name: &str) -> Result<Vec<RegistryEntry>> {
        let url = format!("{}/v1/health/service/{}?passing=true", self.base_url, name);
        let raw: Vec<HealthServiceEntry> = self.get_json(&url).await?;

        let entries: Vec<RegistryEntry> = raw
            .into_iter()
            .map(|e| self.to_entry(name, e))
            .filter(|e| e.health.is_healthy())
            .collect();

        tracing::debug!(service = %name, healthy = entries.len(), "Fetched Consul health");
        Ok(entries)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct HealthServiceEntry {
    #[serde(rename = "Node", default)]
    node: NodeInfo,
    #[serde(rename = "Service")]
    service: ServiceInfo,
    #[serde(rename = "Checks", default)]
    checks: Vec<HealthCheck>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeInfo {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port", default)]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct HealthCheck {
    #[serde(rename = "Status")]
    status: String,
}

/// Agent service registration payload.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Check")]
    pub check: ServiceCheck,
}

/// HTTP health check attached to a registration.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    #[serde(rename = "Interval")]
    pub interval: String,
    #[serde(rename = "Timeout")]
    pub timeout: String,
}

impl ServiceRegistration {
    /// Registration whose health check polls `GET /health` on the advertised address.
    pub fn with_http_check(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        interval: impl Into<String>,
        timeout: impl Into<String>,
    ) -> Self {
        let address = address.into();
        Self {
            id: id.into(),
            name: name.into(),
            check: ServiceCheck {
                http: format!("http://{}:{}/health", address, port),
                interval: interval.into(),
                timeout: timeout.into(),
            },
            address,
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_entry_falls_back_to_node_address() {
        let consul = ConsulDiscovery::new("http://consul:8500/", Duration::from_secs(1))
            .unwrap()
            .with_default_port(8080);
        assert_eq!(consul.base_url, "http://consul:8500");

        let raw: HealthServiceEntry = serde_json::from_value(json!({
            "Node": {"Address": "10.0.0.9"},
            "Service": {"ID": "identity-1", "Service": "identity", "Address": "", "Port": 0},
            "Checks": [{"Status": "passing"}, {"Status": "passing"}]
        }))
        .unwrap();

        let entry = consul.to_entry("identity", raw);
        assert_eq!(entry.address, "10.0.0.9");
        assert_eq!(entry.port, 8080);
        assert_eq!(entry.health, HealthStatus::Passing);
    }

    #[test]
    fn test_aggregate_health_takes_worst() {
        let checks = vec![
            HealthCheck { status: "passing".into() },
            HealthCheck { status: "warning".into() },
        ];
        assert_eq!(aggregate_health(&checks), HealthStatus::Warning);

        let checks = vec![
            HealthCheck { status: "warning".into() },
            HealthCheck { status: "critical".into() },
        ];
        assert_eq!(aggregate_health(&checks), HealthStatus::Critical);
        assert_eq!(aggregate_health(&[]), HealthStatus::Passing);
    }

    #[test]
    fn test_registration_payload_shape() {
        let reg = ServiceRegistration::with_http_check(
            "mcp-service",
            "mcp-service",
            "mcp-service",
            8086,
            "10s",
            "5s",
        );
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["ID"], "mcp-service");
        assert_eq!(value["Port"], 8086);
        assert_eq!(value["Check"]["HTTP"], "http://mcp-service:8086/health");
        assert_eq!(value["Check"]["Interval"], "10s");
    }
}
