//! Mock implementations of core traits for testing.
//!
//! These mocks count their calls so tests can assert that a stage issued no
//! collaborator traffic at all.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{
    traits::{ChatMessage, LlmClient, LlmResponse, LlmUsage, SchemaSource, ServiceDiscovery},
    types::{HealthStatus, RegistryEntry},
    Error, Result,
};

// =============================================================================
// Mock LLM Client
// =============================================================================

/// Scripted mock oracle that returns predefined replies in order.
///
/// The last reply repeats once the script is exhausted.
pub struct MockLlm {
    responses: Vec<String>,
    should_fail: bool,
    call_count: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockLlm {
    /// Create a new mock oracle with a queue of replies.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            should_fail: false,
            call_count: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same reply.
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Number of calls made to this mock.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Messages sent on the most recent call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();

        if self.should_fail {
            return Err(Error::oracle("Mock failure"));
        }

        let idx = n.min(self.responses.len().saturating_sub(1));
        let content = self.responses.get(idx).cloned().unwrap_or_default();

        Ok(LlmResponse {
            content,
            finish_reason: Some("stop".to_string()),
            usage: LlmUsage::default(),
        })
    }
}

// =============================================================================
// Mock Discovery Backend
// =============================================================================

/// In-memory discovery backend.
#[derive(Default)]
pub struct MockDiscovery {
    services: Mutex<Vec<(String, Vec<RegistryEntry>)>>,
    unreachable: bool,
    list_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that fails every query.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Register a service with one passing instance.
    pub fn with_service(self, name: &str, address: &str, port: u16) -> Self {
        self.with_instance(name, address, port, HealthStatus::Passing)
    }

    /// Register a service with no instances at all.
    pub fn with_empty_service(self, name: &str) -> Self {
        self.services.lock().unwrap().push((name.to_string(), Vec::new()));
        self
    }

    /// Register an instance with an explicit health status.
    pub fn with_instance(self, name: &str, address: &str, port: u16, health: HealthStatus) -> Self {
        let entry = RegistryEntry {
            logical_name: name.to_string(),
            address: address.to_string(),
            port,
            health,
        };
        {
            let mut services = self.services.lock().unwrap();
            match services.iter_mut().find(|(n, _)| n == name) {
                Some((_, instances)) => instances.push(entry),
                None => services.push((name.to_string(), vec![entry])),
            }
        }
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceDiscovery for MockDiscovery {
    async fn list_services(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Error::registry("Mock discovery backend unreachable"));
        }
        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn healthy_instances(&self, name: &str) -> Result<Vec<RegistryEntry>> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Error::registry("Mock discovery backend unreachable"));
        }
        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .flat_map(|(_, instances)| instances.iter())
            .filter(|entry| entry.health.is_healthy())
            .cloned()
            .collect())
    }
}

// =============================================================================
// Mock Schema Source
// =============================================================================

/// Schema source serving canned documents keyed by logical service name.
#[derive(Default)]
pub struct MockSchemaSource {
    documents: HashMap<String, Value>,
    fetch_calls: AtomicUsize,
}

impl MockSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for `service`. Services without a document fail.
    pub fn with_document(mut self, service: &str, document: Value) -> Self {
        self.documents.insert(service.to_string(), document);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaSource for MockSchemaSource {
    async fn fetch(
        &self,
        instance: &RegistryEntry,
        schema_path: &str,
        _port_override: Option<u16>,
    ) -> Result<Value> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(&instance.logical_name)
            .cloned()
            .ok_or_else(|| {
                Error::internal(format!(
                    "Mock schema fetch failed for {}{}",
                    instance.logical_name, schema_path
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_script_repeats_last() {
        let llm = MockLlm::new(vec!["one".into(), "two".into()]);
        let msgs = [ChatMessage::user("hi")];
        assert_eq!(llm.chat(&msgs).await.unwrap().content, "one");
        assert_eq!(llm.chat(&msgs).await.unwrap().content, "two");
        assert_eq!(llm.chat(&msgs).await.unwrap().content, "two");
        assert_eq!(llm.call_count(), 3);
        assert_eq!(llm.last_messages(), msgs.to_vec());
    }

    #[tokio::test]
    async fn test_mock_discovery_filters_unhealthy() {
        let discovery = MockDiscovery::new()
            .with_instance("identity", "10.0.0.1", 8080, HealthStatus::Critical)
            .with_instance("identity", "10.0.0.2", 8080, HealthStatus::Passing);

        let healthy = discovery.healthy_instances("identity").await.unwrap();
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].address, "10.0.0.2");
        assert_eq!(discovery.health_calls(), 1);
    }
}
