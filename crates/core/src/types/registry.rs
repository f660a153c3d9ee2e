use serde::{Deserialize, Serialize};

/// Health of a registered instance as reported by the discovery backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Parse a Consul check status. Unknown values count as critical.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "passing" => Self::Passing,
            "warning" => Self::Warning,
            _ => Self::Critical,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Passing)
    }
}

/// One instance of a logical service, as seen by the discovery backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub logical_name: String,
    /// Host name or IP address.
    pub address: String,
    pub port: u16,
    pub health: HealthStatus,
}

impl RegistryEntry {
    /// Base URL of the instance, optionally on a different port.
    pub fn base_url(&self, port_override: Option<u16>) -> String {
        format!("http://{}:{}", self.address, port_override.unwrap_or(self.port))
    }
}
