//! Core type definitions for the capability gateway.
//!
//! Every value here is transient: rebuilt for each incoming request and never
//! persisted.

pub mod capability;
pub mod plan;
pub mod registry;

pub use capability::*;
pub use plan::*;
pub use registry::*;
