#![deny(unused)]
//! Capability Registry for the gateway.
//!
//! This crate provides:
//! - A Consul client for catalog and health queries
//! - A read-through TTL cache over any discovery backend
//! - Registry lookups (reachable services, healthy address resolution)
//! - Self-registration of this process with Consul

pub mod cache;
pub mod consul;
pub mod registry;

pub use cache::CachedDiscovery;
pub use consul::{ConsulDiscovery, ServiceRegistration};
pub use registry::CapabilityRegistry;
