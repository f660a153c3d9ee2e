#![deny(unused)]
//! Request controller for the capability gateway.
//!
//! This crate provides:
//! - Intent resolution through the reasoning oracle
//! - Plan validation and dispatch to the target service
//! - The per-request aggregate → resolve → dispatch pipeline

pub mod dispatcher;
pub mod pipeline;
pub mod resolver;

pub use dispatcher::Dispatcher;
pub use pipeline::{ChatPipeline, PipelineFailure, PipelineStage};
pub use resolver::{build_system_prompt, parse_plan, IntentResolver};
