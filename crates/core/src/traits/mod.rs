//! Collaborator traits for the capability gateway.
//!
//! Each trait marks one external boundary:
//! - `discovery`: discovery backend (catalog + health)
//! - `schema_source`: per-service API description endpoint
//! - `llm`: reasoning oracle

pub mod discovery;
pub mod llm;
pub mod schema_source;

pub use discovery::*;
pub use llm::*;
pub use schema_source::*;
