#![deny(unused)]
//! Core types, traits, and error definitions for the capability gateway.
//!
//! This crate provides the building blocks shared by the registry, context,
//! oracle, dispatch and HTTP layers.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
