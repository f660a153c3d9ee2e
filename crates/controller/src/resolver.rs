//! Intent resolution.
//!
//! Turns free text into an [`InvocationPlan`] with one oracle round-trip:
//! 1. Describe every known service and operation in a system prompt
//! 2. Send it with the user's message
//! 3. Extract the JSON object from the reply, tolerating surrounding prose

use std::fmt::Write as _;
use std::sync::Arc;

use mcp_core::{
    traits::{ChatMessage, LlmClient},
    types::{CapabilityContext, CapabilityDescriptor, InvocationPlan, ResolvedIntent},
    Error, Result,
};

/// Resolves user requests into invocation plans via the reasoning oracle.
pub struct IntentResolver {
    llm: Arc<dyn LlmClient>,
}

impl IntentResolver {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask the oracle for a plan against `context`.
    ///
    /// The raw reply is returned alongside the plan as the explanation.
    pub async fn resolve_intent(
        &self,
        context: &CapabilityContext,
        user_text: &str,
    ) -> Result<ResolvedIntent> {
        let messages = [
            ChatMessage::system(build_system_prompt(context)),
            ChatMessage::user(user_text),
        ];

        let reply = self.llm.chat(&messages).await?;
        tracing::debug!(
            reply_len = reply.content.len(),
            finish_reason = reply.finish_reason.as_deref().unwrap_or("unknown"),
            prompt_tokens = reply.usage.prompt_tokens,
            completion_tokens = reply.usage.completion_tokens,
            total_tokens = reply.usage.total_tokens,
            "Oracle reply received"
        );
        if reply.finish_reason.as_deref() == Some("length") {
            tracing::warn!("Oracle reply was truncated at the token limit");
        }

        let plan = parse_plan(&reply.content)?;
        tracing::info!(
            service = %plan.target_service,
            endpoint = %plan.endpoint_path,
            method = %plan.method,
            "Resolved invocation plan"
        );

        Ok(ResolvedIntent {
            plan,
            explanation: reply.content,
        })
    }
}

/// Build the system prompt enumerating every service and its operations.
pub fn build_system_prompt(context: &CapabilityContext) -> String {
    let services = describe_services(context);
    let plan_schema = serde_json::to_string_pretty(&schemars::schema_for!(InvocationPlan))
        .unwrap_or_default();

    format!(
        r#"You are an API assistant. Given a user request and the available services, determine:
1. Which service to call
2. Which endpoint to use
3. Which HTTP method to use
4. What parameters are needed

Return ONLY one JSON object in this exact format:
{{
    "service": "service_name",
    "endpoint": "/endpoint_path",
    "method": "HTTP_METHOD",
    "parameters": {{}}
}}

The object must match this JSON schema:
{plan_schema}

AVAILABLE SERVICES:
{services}"#
    )
}

fn describe_services(context: &CapabilityContext) -> String {
    if context.is_empty() {
        return "No services are currently available.\n".to_string();
    }

    let mut out = String::new();
    for (name, descriptor) in context {
        describe_service(&mut out, name, descriptor);
    }
    out
}

fn describe_service(out: &mut String, name: &str, descriptor: &CapabilityDescriptor) {
    let _ = writeln!(out, "\nService: {} ({})", name, descriptor.name);
    if !descriptor.description.is_empty() {
        let _ = writeln!(out, "Description: {}", descriptor.description);
    }
    if let Some(base) = descriptor.metadata.get("basePath").and_then(|v| v.as_str()) {
        let _ = writeln!(out, "Base path: {}", base);
    }

    for op in &descriptor.endpoints {
        let _ = write!(out, "- {} {}", op.method, op.path);
        if !op.summary.is_empty() {
            let _ = write!(out, ": {}", op.summary);
        }
        out.push('\n');

        for param in &op.parameters {
            let type_name = match param.schema.type_name.as_str() {
                "" => "any",
                t => t,
            };
            let required = if param.required { ", required" } else { "" };
            let _ = writeln!(
                out,
                "    param {} (in {}, {}{})",
                param.name, param.location, type_name, required
            );
        }
        if op.request_body.is_some() {
            out.push_str("    accepts a JSON request body\n");
        }
    }
}

/// Extract an [`InvocationPlan`] from raw oracle text.
///
/// Takes the span from the first `{` to the last `}`, so prose before and
/// after the object is ignored.
pub fn parse_plan(text: &str) -> Result<InvocationPlan> {
    let start = text.find('{');
    let end = text.rfind('}');

    let span = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(Error::parse("no JSON object found in oracle reply")),
    };

    serde_json::from_str(span)
        .map_err(|e| Error::parse(format!("oracle reply is not a valid plan: {}", e)))
}
