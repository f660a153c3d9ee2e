use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub context: ContextConfig,
    pub oracle: OracleConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Upper bound for one aggregate → resolve → dispatch run.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Base URL of the Consul agent.
    pub address: String,
    pub timeout_secs: u64,
    /// Lifetime of cached catalog/health lookups. Zero disables the cache.
    pub cache_ttl_secs: u64,
    /// Port assumed for instances that register without one.
    pub default_port: u16,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationConfig {
    pub enabled: bool,
    pub service_id: String,
    pub service_name: String,
    /// Host name other services (and the health checker) use to reach us.
    pub advertise_address: String,
    pub check_interval: String,
    pub check_timeout: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// Services with a known API description location, keyed by logical name.
    pub services: HashMap<String, ServiceDocConfig>,
    pub fetch_timeout_secs: u64,
    pub max_schema_depth: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceDocConfig {
    /// Path of the API description relative to the instance root.
    pub schema_path: String,
    /// Fixed port the description is served on, overriding the registered port.
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: Option<String>,
    pub api_key: Option<Secret<String>>,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    pub allowed_methods: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("MCP_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map MCP__SERVER__PORT=8086 to server.port
            .add_source(Environment::with_prefix("MCP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

impl ContextConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        let mut services = HashMap::new();
        services.insert(
            "identity".to_string(),
            ServiceDocConfig {
                schema_path: "/swagger/doc.json".into(),
                port: None,
            },
        );
        Self {
            services,
            fetch_timeout_secs: 10,
            max_schema_depth: 32,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            allowed_methods: vec!["GET".into(), "POST".into()],
            timeout_secs: 15,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8086,
                enable_cors: true,
                request_timeout_secs: 120,
            },
            discovery: DiscoveryConfig {
                address: "http://consul:8500".into(),
                timeout_secs: 5,
                cache_ttl_secs: 0,
                default_port: 8080,
                registration: RegistrationConfig {
                    enabled: false,
                    service_id: "mcp-service".into(),
                    service_name: "mcp-service".into(),
                    advertise_address: "mcp-service".into(),
                    check_interval: "10s".into(),
                    check_timeout: "5s".into(),
                },
            },
            context: ContextConfig::default(),
            oracle: OracleConfig {
                base_url: "http://llama-server:8082".into(),
                model: None,
                api_key: None,
                timeout_secs: 60,
                temperature: None,
            },
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
