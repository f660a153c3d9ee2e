use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Invocation Plan (Intent Resolver output)
// =============================================================================

/// A single downstream call proposed by the reasoning oracle.
///
/// Never trusted until the dispatcher has validated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvocationPlan {
    /// Logical name of the target service.
    #[serde(rename = "service")]
    pub target_service: String,
    /// Endpoint path on the target service, starting with `/`.
    #[serde(rename = "endpoint")]
    pub endpoint_path: String,
    /// HTTP method to use.
    pub method: String,
    /// Parameters keyed by name.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A plan together with the oracle's raw reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedIntent {
    pub plan: InvocationPlan,
    /// Unmodified oracle text, shown to the user as the rationale.
    pub explanation: String,
}

/// Raw result of a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl DispatchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Final outcome of one chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub api_response: String,
    pub explanation: String,
}
