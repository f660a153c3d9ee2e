#![deny(unused)]
//! MCP service: intent-driven gateway over discovered services.
//!
//! Discovers services through Consul, harmonizes their API descriptions, asks
//! a reasoning oracle to turn a chat message into one API call, and performs
//! that call against a healthy instance.

use std::sync::Arc;

use mcp_context::{ContextAggregator, HttpSchemaSource};
use mcp_controller::{ChatPipeline, Dispatcher, IntentResolver};
use mcp_core::config::AppConfig;
use mcp_core::traits::ServiceDiscovery;
use mcp_discovery::{CachedDiscovery, CapabilityRegistry, ConsulDiscovery, ServiceRegistration};
use mcp_gateway::{GatewayConfig, GatewayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    mcp_gateway::configure_tracing(config.logging.json)?;
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Failed to load configuration files, using defaults");
    }

    tracing::info!("Starting mcp-service v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Discovery
    // =========================================================================
    let consul = Arc::new(
        ConsulDiscovery::new(&config.discovery.address, config.discovery.timeout())?
            .with_default_port(config.discovery.default_port),
    );
    let discovery: Arc<dyn ServiceDiscovery> = match config.discovery.cache_ttl() {
        Some(ttl) => {
            tracing::info!(ttl_secs = ttl.as_secs(), "Discovery cache enabled");
            let cache = Arc::new(CachedDiscovery::new(consul.clone(), ttl));
            let sweeper = cache.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(ttl);
                loop {
                    interval.tick().await;
                    sweeper.cleanup();
                }
            });
            cache
        }
        None => consul.clone(),
    };
    let registry = CapabilityRegistry::new(discovery);

    // =========================================================================
    // Context, oracle, dispatch
    // =========================================================================
    let aggregator = Arc::new(ContextAggregator::new(
        registry.clone(),
        Arc::new(HttpSchemaSource::new(config.context.fetch_timeout())?),
        &config.context,
    ));
    let oracle = Arc::new(mcp_model_gateway::create_client_from_config(&config.oracle)?);
    let pipeline = Arc::new(ChatPipeline::new(
        aggregator.clone(),
        IntentResolver::new(oracle),
        Dispatcher::new(registry, &config.dispatch)?,
        config.server.request_timeout(),
    ));

    // =========================================================================
    // Self-registration
    // =========================================================================
    let registration = &config.discovery.registration;
    if registration.enabled {
        let reg = ServiceRegistration::with_http_check(
            &registration.service_id,
            &registration.service_name,
            &registration.advertise_address,
            config.server.port,
            &registration.check_interval,
            &registration.check_timeout,
        );
        match consul.register(&reg).await {
            Ok(()) => tracing::info!(service_id = %reg.id, "Registered with Consul"),
            Err(e) => tracing::warn!(error = %e, "Consul registration failed, continuing unregistered"),
        }
    }

    // =========================================================================
    // Serve
    // =========================================================================
    let server = GatewayServer::new(GatewayConfig::from(&config.server), pipeline, aggregator);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if registration.enabled {
        if let Err(e) = consul.deregister(&registration.service_id).await {
            tracing::warn!(error = %e, "Consul deregistration failed");
        }
    }

    tracing::info!("mcp-service stopped");
    Ok(())
}
