#![deny(unused)]
//! HTTP gateway for the capability service.
//!
//! This crate provides the inbound HTTP surface (chat, service listing,
//! per-service descriptions, health) and process-wide logging setup.

pub mod server;
pub mod telemetry;

pub use server::{GatewayConfig, GatewayServer};
pub use telemetry::configure_tracing;
