#![deny(unused)]
//! Capability context for the gateway.
//!
//! This crate provides:
//! - The schema harmonizer (native API description to capability schema)
//! - An HTTP source for per-service API descriptions
//! - The context aggregator that combines registry and harmonizer

pub mod aggregator;
pub mod harmonizer;
pub mod source;

pub use aggregator::ContextAggregator;
pub use harmonizer::{convert_schema, harmonize, Harmonizer};
pub use source::HttpSchemaSource;
