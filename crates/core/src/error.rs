//! Error types for the capability gateway.

use thiserror::Error;

/// Result type alias using the gateway's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the capability gateway.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Schema Harmonizer
    // =========================================================================
    #[error("Schema error: {0}")]
    Schema(String),

    // =========================================================================
    // Capability Registry
    // =========================================================================
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("No healthy instance found for service: {0}")]
    NotFound(String),

    // =========================================================================
    // Intent Resolver
    // =========================================================================
    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // =========================================================================
    // Dispatcher
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Downstream error{}: {message}", status_suffix(.status))]
    Downstream {
        /// HTTP status returned by the downstream service, if any.
        status: Option<u16>,
        /// Response body or transport error detail.
        body: String,
        /// Summary of what failed.
        message: String,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl Error {
    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a not-found error for a logical service name.
    pub fn not_found(service: impl Into<String>) -> Self {
        Self::NotFound(service.into())
    }

    /// Create an oracle error.
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a routing error.
    pub fn routing(msg: impl Into<String>) -> Self {
        Self::Routing(msg.into())
    }

    /// Create a downstream error from a non-success response.
    pub fn downstream(status: Option<u16>, body: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Downstream {
            status,
            body: body.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::Registry(_) => "registry",
            Self::NotFound(_) => "not_found",
            Self::Oracle(_) => "oracle",
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Routing(_) => "routing",
            Self::Downstream { .. } => "downstream",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
            Self::Other(_) => "other",
        }
    }
}
