//! Plan execution against the live service instance.

use reqwest::Method;
use serde_json::Value;

use mcp_core::{
    config::DispatchConfig,
    types::{CapabilityContext, DispatchResponse, InvocationPlan},
    Error, Result,
};
use mcp_discovery::CapabilityRegistry;

/// Validates invocation plans and performs the downstream call.
///
/// Never retries; a failed call surfaces as [`Error::Downstream`].
pub struct Dispatcher {
    registry: CapabilityRegistry,
    client: reqwest::Client,
    allowed_methods: Vec<Method>,
}

impl Dispatcher {
    pub fn new(registry: CapabilityRegistry, config: &DispatchConfig) -> Result<Self> {
        let allowed_methods = config
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| Error::Config(format!("invalid HTTP method in allow-list: {}", m)))
            })
            .collect::<Result<Vec<_>>>()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::internal(format!("Failed to build dispatch client: {}", e)))?;

        Ok(Self {
            registry,
            client,
            allowed_methods,
        })
    }

    /// Check a plan against the allow-list and the current context.
    ///
    /// Returns the normalized method. Performs no I/O.
    pub fn validate(&self, plan: &InvocationPlan, context: &CapabilityContext) -> Result<Method> {
        let raw = plan.method.trim().to_ascii_uppercase();
        let method = self
            .allowed_methods
            .iter()
            .find(|m| m.as_str() == raw)
            .cloned()
            .ok_or_else(|| {
                Error::validation(format!("HTTP method '{}' is not allowed", plan.method))
            })?;

        if !context.contains_key(&plan.target_service) {
            return Err(Error::validation(format!(
                "unknown service '{}'",
                plan.target_service
            )));
        }

        let path = &plan.endpoint_path;
        if !path.starts_with('/') || path.contains("://") {
            return Err(Error::validation(format!(
                "endpoint '{}' must be a path starting with '/'",
                path
            )));
        }

        Ok(method)
    }

    /// Execute a validated plan and return the raw downstream response.
    pub async fn execute(
        &self,
        plan: &InvocationPlan,
        context: &CapabilityContext,
    ) -> Result<DispatchResponse> {
        let method = self.validate(plan, context)?;

        let instance = self
            .registry
            .resolve(&plan.target_service)
            .await
            .map_err(|e| match e {
                Error::NotFound(name) => {
                    Error::routing(format!("no healthy instance of '{}'", name))
                }
                other => Error::routing(other.to_string()),
            })?;

        let url = format!("{}{}", instance.base_url(None), plan.endpoint_path);
        tracing::info!(
            service = %plan.target_service,
            method = %method,
            url = %url,
            "Dispatching plan"
        );

        let request = if method == Method::GET {
            self.client.get(&url).query(&query_params(plan))
        } else {
            self.client.request(method, &url).json(&plan.parameters)
        };

        let response = request.send().await.map_err(|e| {
            Error::downstream(None, e.to_string(), format!("request to {} failed", url))
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| {
            Error::downstream(
                Some(status.as_u16()),
                e.to_string(),
                format!("failed to read response from {}", url),
            )
        })?;

        if !status.is_success() {
            tracing::warn!(service = %plan.target_service, status = %status, "Downstream call failed");
            return Err(Error::downstream(
                Some(status.as_u16()),
                String::from_utf8_lossy(&body),
                format!("{} returned {}", plan.target_service, status),
            ));
        }

        Ok(DispatchResponse {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}

/// Parameters carried as query string on a GET.
///
/// Only scalars survive; nulls, arrays and objects have no plain string form.
fn query_params(plan: &InvocationPlan) -> Vec<(String, String)> {
    plan.parameters
        .iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_core::mocks::MockDiscovery;
    use mcp_core::types::CapabilityDescriptor;
    use serde_json::json;
    use std::sync::Arc;

    fn context_with(names: &[&str]) -> CapabilityContext {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    CapabilityDescriptor {
                        name: n.to_string(),
                        description: String::new(),
                        endpoints: Vec::new(),
                        schemas: Default::default(),
                        metadata: Default::default(),
                    },
                )
            })
            .collect()
    }

    fn plan(service: &str, endpoint: &str, method: &str) -> InvocationPlan {
        InvocationPlan {
            target_service: service.into(),
            endpoint_path: endpoint.into(),
            method: method.into(),
            parameters: Default::default(),
        }
    }

    fn dispatcher(discovery: Arc<MockDiscovery>) -> Dispatcher {
        Dispatcher::new(CapabilityRegistry::new(discovery), &DispatchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_disallowed_method_never_resolves() {
        let discovery = Arc::new(MockDiscovery::new().with_service("identity", "127.0.0.1", 1));
        let d = dispatcher(discovery.clone());

        let err = d
            .execute(&plan("identity", "/users/7", "DELETE"), &context_with(&["identity"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(discovery.health_calls(), 0);
    }

    #[test]
    fn test_method_is_normalized() {
        let d = dispatcher(Arc::new(MockDiscovery::new()));
        let method = d
            .validate(&plan("identity", "/ping", " get "), &context_with(&["identity"]))
            .unwrap();
        assert_eq!(method, Method::GET);
    }

    #[test]
    fn test_unknown_service_and_bad_paths() {
        let d = dispatcher(Arc::new(MockDiscovery::new()));
        let context = context_with(&["identity"]);

        let err = d.validate(&plan("billing", "/ping", "GET"), &context).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        for endpoint in ["ping", "http://evil.example/ping", "/redirect?to=http://x"] {
            let err = d.validate(&plan("identity", endpoint, "GET"), &context).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{}", endpoint);
        }
    }

    #[tokio::test]
    async fn test_no_healthy_instance_is_routing_error() {
        let discovery = Arc::new(MockDiscovery::new().with_empty_service("identity"));
        let d = dispatcher(discovery.clone());

        let err = d
            .execute(&plan("identity", "/ping", "GET"), &context_with(&["identity"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Routing(_)));
        assert_eq!(discovery.health_calls(), 1);
    }

    #[test]
    fn test_invalid_allow_list_is_config_error() {
        let config = DispatchConfig {
            allowed_methods: vec!["GET".into(), "NOT A METHOD".into()],
            timeout_secs: 1,
        };
        let result = Dispatcher::new(
            CapabilityRegistry::new(Arc::new(MockDiscovery::new())),
            &config,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_query_params_keep_scalars_only() {
        let mut p = plan("identity", "/search", "GET");
        p.parameters = json!({
            "name": "ada",
            "limit": 10,
            "active": true,
            "tags": ["a"],
            "filter": {"x": 1},
            "cursor": null
        })
        .as_object()
        .cloned()
        .unwrap();

        let mut params = query_params(&p);
        params.sort();
        assert_eq!(
            params,
            vec![
                ("active".to_string(), "true".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("name".to_string(), "ada".to_string()),
            ]
        );
    }
}
