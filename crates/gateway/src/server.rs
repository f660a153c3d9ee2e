//! Axum-based HTTP server for the gateway.

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use mcp_context::ContextAggregator;
use mcp_controller::ChatPipeline;
use mcp_core::{config::ServerConfig, Error, Result};

/// Response header carrying the request's trace id.
const TRACE_ID_HEADER: &str = "x-trace-id";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
            enable_tracing: true,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Aggregate → resolve → dispatch pipeline.
    pub pipeline: Arc<ChatPipeline>,
    /// Context aggregator, for the listing and description routes.
    pub aggregator: Arc<ContextAggregator>,
    /// Cancelled on shutdown; every request runs under a child token.
    pub shutdown: CancellationToken,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(
        config: GatewayConfig,
        pipeline: Arc<ChatPipeline>,
        aggregator: Arc<ContextAggregator>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                pipeline,
                aggregator,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/chat", post(chat_handler))
            .route("/contexts", get(list_services_handler))
            .route("/services", get(list_services_handler))
            .route("/context/:service", get(describe_service_handler))
            .route("/services/:service", get(describe_service_handler))
            .with_state(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE]),
            );
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the server until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `signal` resolves, then cancel in-flight requests
    /// and drain.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                signal.await;
                tracing::info!("Shutdown signal received, cancelling in-flight requests");
                shutdown.cancel();
            })
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Free-text user message.
    pub message: String,
}

/// Service listing.
#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub available_contexts: Vec<String>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Chat handler: one full pipeline run per message.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            tracing::warn!(trace_id = %trace_id, error = %rejection, "Rejected chat request");
            return error_response(StatusCode::BAD_REQUEST, "invalid request");
        }
    };

    tracing::info!(
        trace_id = %trace_id,
        message_len = request.message.len(),
        "Processing chat request"
    );

    let cancel = state.shutdown.child_token();
    let started = std::time::Instant::now();
    let mut response = match state.pipeline.handle(&request.message, &cancel).await {
        Ok(outcome) => {
            tracing::info!(
                trace_id = %trace_id,
                elapsed_ms = elapsed_ms(started.elapsed()),
                "Chat request succeeded"
            );
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(failure) => {
            tracing::error!(
                trace_id = %trace_id,
                stage = %failure.stage,
                error = %failure.error,
                "Chat request failed"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
        }
    };

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Names of every service with a configured description.
async fn list_services_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.available_services().await {
        Ok(available_contexts) => Json(ServicesResponse { available_contexts }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list services");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to get services: {}", e),
            )
        }
    }
}

/// Harmonized description of one service.
async fn describe_service_handler(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> Response {
    match state.aggregator.describe(&service).await {
        Ok(Some(descriptor)) => Json(descriptor).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no description configured for service: {}", service),
        ),
        Err(e) => {
            tracing::error!(service = %service, error = %e, "Failed to describe service");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to get service details: {}", e),
            )
        }
    }
}

fn elapsed_ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
