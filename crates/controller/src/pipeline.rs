//! Per-request chat pipeline.
//!
//! `Idle → Aggregating → Resolving → Dispatching → {Done, Failed}`. Stages run
//! strictly in order; the first failure ends the run with the stage attached.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use mcp_context::ContextAggregator;
use mcp_core::{types::ChatOutcome, Error};

use crate::dispatcher::Dispatcher;
use crate::resolver::IntentResolver;

/// Lifecycle stage of one chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Aggregating,
    Resolving,
    Dispatching,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Aggregating => "aggregating",
            Self::Resolving => "resolving",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A pipeline run that ended in `Failed`, with the stage that failed.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: Error,
}

/// Aggregate → resolve → dispatch, for one user message at a time.
///
/// Holds no per-request state; one instance serves all requests concurrently.
pub struct ChatPipeline {
    aggregator: Arc<ContextAggregator>,
    resolver: IntentResolver,
    dispatcher: Dispatcher,
    request_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        aggregator: Arc<ContextAggregator>,
        resolver: IntentResolver,
        dispatcher: Dispatcher,
        request_timeout: Duration,
    ) -> Self {
        Self {
            aggregator,
            resolver,
            dispatcher,
            request_timeout,
        }
    }

    /// Run the full pipeline for one message.
    ///
    /// The in-flight stage is dropped as soon as `cancel` fires or the request
    /// deadline passes.
    pub async fn handle(
        &self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, PipelineFailure> {
        let deadline = Instant::now() + self.request_timeout;

        let context = run_stage(
            PipelineStage::Aggregating,
            cancel,
            deadline,
            self.aggregator.build_context(),
        )
        .await?;

        let resolved = run_stage(
            PipelineStage::Resolving,
            cancel,
            deadline,
            self.resolver.resolve_intent(&context, message),
        )
        .await?;

        let response = run_stage(
            PipelineStage::Dispatching,
            cancel,
            deadline,
            self.dispatcher.execute(&resolved.plan, &context),
        )
        .await?;

        tracing::info!(
            stage = %PipelineStage::Done,
            service = %resolved.plan.target_service,
            status = response.status,
            "Chat request completed"
        );

        Ok(ChatOutcome {
            api_response: response.body_text(),
            explanation: resolved.explanation,
        })
    }
}

async fn run_stage<T, F>(
    stage: PipelineStage,
    cancel: &CancellationToken,
    deadline: Instant,
    fut: F,
) -> Result<T, PipelineFailure>
where
    F: std::future::Future<Output = mcp_core::Result<T>>,
{
    tracing::debug!(stage = %stage, "Entering stage");

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout_at(deadline, fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout(format!("request deadline exceeded while {}", stage))),
        },
    };

    outcome.map_err(|error| {
        tracing::warn!(
            stage = %stage,
            next = %PipelineStage::Failed,
            kind = error.kind(),
            error = %error,
            "Pipeline stage failed"
        );
        PipelineFailure { stage, error }
    })
}
