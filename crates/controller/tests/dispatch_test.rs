use axum::{
    extract::RawQuery,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mcp_context::ContextAggregator;
use mcp_controller::{ChatPipeline, Dispatcher, IntentResolver, PipelineStage};
use mcp_core::config::{ContextConfig, DispatchConfig};
use mcp_core::mocks::{MockDiscovery, MockLlm, MockSchemaSource};
use mcp_core::types::{CapabilityContext, CapabilityDescriptor, InvocationPlan};
use mcp_core::Error;
use mcp_discovery::CapabilityRegistry;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

async fn start_downstream() -> SocketAddr {
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/search",
            get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }),
        )
        .route("/users", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route(
            "/fail",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance window") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn identity_context() -> CapabilityContext {
    let mut context = CapabilityContext::new();
    context.insert(
        "identity".into(),
        CapabilityDescriptor {
            name: "Identity".into(),
            description: "Identity service".into(),
            endpoints: Vec::new(),
            schemas: Default::default(),
            metadata: Default::default(),
        },
    );
    context
}

fn plan(endpoint: &str, method: &str, parameters: Value) -> InvocationPlan {
    InvocationPlan {
        target_service: "identity".into(),
        endpoint_path: endpoint.into(),
        method: method.into(),
        parameters: parameters.as_object().cloned().unwrap_or_default(),
    }
}

fn dispatcher_for(addr: SocketAddr) -> Dispatcher {
    let discovery = MockDiscovery::new().with_service("identity", &addr.ip().to_string(), addr.port());
    Dispatcher::new(
        CapabilityRegistry::new(Arc::new(discovery)),
        &DispatchConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_get_returns_raw_body() {
    let addr = start_downstream().await;
    let response = dispatcher_for(addr)
        .execute(&plan("/ping", "GET", json!({})), &identity_context())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "pong");
    assert!(response
        .content_type
        .as_deref()
        .unwrap_or_default()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_get_sends_scalar_query_params() {
    let addr = start_downstream().await;
    let response = dispatcher_for(addr)
        .execute(
            &plan("/search", "GET", json!({"name": "ada", "tags": ["x"]})),
            &identity_context(),
        )
        .await
        .unwrap();
    assert_eq!(response.body_text(), "name=ada");
}

#[tokio::test]
async fn test_post_sends_parameters_as_body() {
    let addr = start_downstream().await;
    let params = json!({"name": "ada", "roles": ["admin"], "profile": {"age": 36}});
    let response = dispatcher_for(addr)
        .execute(&plan("/users", "POST", params.clone()), &identity_context())
        .await
        .unwrap();

    let echoed: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(echoed, params);
}

#[tokio::test]
async fn test_non_success_is_downstream_error() {
    let addr = start_downstream().await;
    let err = dispatcher_for(addr)
        .execute(&plan("/fail", "GET", json!({})), &identity_context())
        .await
        .unwrap_err();

    match err {
        Error::Downstream { status, body, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(body, "maintenance window");
        }
        other => panic!("expected downstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_instance_is_downstream_error() {
    // Nothing listens on port 1.
    let discovery = MockDiscovery::new().with_service("identity", "127.0.0.1", 1);
    let dispatcher = Dispatcher::new(
        CapabilityRegistry::new(Arc::new(discovery)),
        &DispatchConfig::default(),
    )
    .unwrap();

    let err = dispatcher
        .execute(&plan("/ping", "GET", json!({})), &identity_context())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Downstream { status: None, .. }));
}

fn slow_pipeline(addr: SocketAddr, request_timeout: Duration) -> ChatPipeline {
    let discovery = Arc::new(
        MockDiscovery::new().with_service("identity", &addr.ip().to_string(), addr.port()),
    );
    let registry = CapabilityRegistry::new(discovery);
    let source = MockSchemaSource::new().with_document(
        "identity",
        json!({
            "info": {"title": "Identity", "description": "Identity service"},
            "paths": {"/slow": {"get": {"summary": "Takes a while"}}}
        }),
    );
    let aggregator = ContextAggregator::new(
        registry.clone(),
        Arc::new(source),
        &ContextConfig::default(),
    );
    let llm = MockLlm::constant(
        r#"{"service":"identity","endpoint":"/slow","method":"GET","parameters":{}}"#,
    );

    ChatPipeline::new(
        Arc::new(aggregator),
        IntentResolver::new(Arc::new(llm)),
        Dispatcher::new(registry, &DispatchConfig::default()).unwrap(),
        request_timeout,
    )
}

#[tokio::test]
async fn test_cancellation_abandons_in_flight_dispatch() {
    let addr = start_downstream().await;
    let pipeline = slow_pipeline(addr, Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let failure = pipeline.handle("slow please", &cancel).await.unwrap_err();
    assert_eq!(failure.stage, PipelineStage::Dispatching);
    assert!(matches!(failure.error, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_deadline_bounds_the_pipeline() {
    let addr = start_downstream().await;
    let pipeline = slow_pipeline(addr, Duration::from_millis(300));

    let failure = pipeline
        .handle("slow please", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.stage, PipelineStage::Dispatching);
    assert!(matches!(failure.error, Error::Timeout(_)));
    assert!(failure.to_string().starts_with("dispatching failed"));
}
