//! The invocation wrapper: payload in, [`InvocationResult`] out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;

use crate::agent::{AgentFactory, BedrockAgentFactory, CreateAgentError};
use crate::config::Config;
use crate::telemetry::{
    NoopTelemetry, Telemetry, TelemetrySpan, telemetry_for,
};

/// The prompt used when the payload carries none.
pub const DEFAULT_PROMPT: &str = "Hello!";

/// The only error message callers ever see.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal processing error";

const PROMPT_ATTRIBUTE_LIMIT: usize = 100;

/// The outcome of one invocation, as returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvocationResult {
    /// The agent answered.
    Success {
        /// Text of the first block of the agent's reply.
        response: String,
    },
    /// Something went wrong. Details are only logged.
    Error {
        /// Always [`INTERNAL_ERROR_MESSAGE`].
        error: String,
    },
}

impl InvocationResult {
    /// The result every failure collapses into.
    #[inline]
    pub fn internal_error() -> Self {
        InvocationResult::Error {
            error: INTERNAL_ERROR_MESSAGE.to_owned(),
        }
    }

    /// Returns whether the invocation succeeded.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }
}

/// A fault during an invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The payload cannot be turned into a prompt.
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
    /// The agent could not be created.
    #[error("failed to create the agent: {0}")]
    CreateAgent(#[from] CreateAgentError),
    /// The agent failed while answering.
    #[error("agent invocation failed: {0}")]
    Agent(#[from] tally_agent_core::Error),
    /// The reply is empty or does not start with text.
    #[error("agent reply does not start with a text block")]
    NoTextContent,
}

impl InvokeError {
    /// A short name for the kind of fault, reported as `agent.error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            InvokeError::InvalidPayload(_) => "InvalidPayload",
            InvokeError::CreateAgent(_) => "CreateAgentError",
            InvokeError::Agent(_) => "AgentError",
            InvokeError::NoTextContent => "NoTextContent",
        }
    }
}

/// Picks the prompt out of an invocation payload.
///
/// A missing payload, `null`, or any other empty value (such as `{}` or
/// `""`) means the default prompt, and so does an object without a
/// `prompt` field. Any other non-object payload and a `prompt` that is not
/// a string are faults.
pub fn resolve_prompt(payload: Option<&Value>) -> Result<String, InvokeError> {
    let Some(payload) = payload.filter(|p| is_truthy(p)) else {
        return Ok(DEFAULT_PROMPT.to_owned());
    };
    let Value::Object(fields) = payload else {
        return Err(InvokeError::InvalidPayload("expected a JSON object"));
    };
    match fields.get("prompt") {
        None => Ok(DEFAULT_PROMPT.to_owned()),
        Some(Value::String(prompt)) => Ok(prompt.clone()),
        Some(_) => {
            Err(InvokeError::InvalidPayload("`prompt` must be a string"))
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Handles invocations: resolves the prompt, runs a fresh agent and maps
/// the outcome to an [`InvocationResult`].
///
/// The invoker holds no mutable state, so one instance can serve any
/// number of concurrent invocations.
pub struct Invoker {
    factory: Arc<dyn AgentFactory>,
    telemetry: Arc<dyn Telemetry>,
}

impl Invoker {
    /// Creates an invoker without telemetry.
    pub fn new<F: AgentFactory + 'static>(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Creates the production invoker: Bedrock agents, with telemetry in
    /// managed deployments.
    pub fn from_config(config: &Config) -> Self {
        Self::new(BedrockAgentFactory::new(config))
            .with_telemetry(telemetry_for(config))
    }

    /// Replaces the telemetry.
    #[inline]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Runs one invocation. Never fails: faults are logged and reported as
    /// [`InvocationResult::internal_error`].
    pub async fn invoke(&self, payload: Option<Value>) -> InvocationResult {
        let span = self.telemetry.start_span("agent_invoke");
        let outcome = self
            .run(payload.as_ref(), span.as_ref())
            .instrument(span.tracing_span())
            .await;

        match outcome {
            Ok(text) => {
                span.set_attribute("agent.status", "success".into());
                span.set_attribute(
                    "agent.response_length",
                    text.chars().count().into(),
                );
                InvocationResult::Success { response: text }
            }
            Err(err) => {
                error!(?payload, "Error processing request: {err}");
                span.set_attribute("agent.status", "error".into());
                span.set_attribute(
                    "agent.error_type",
                    err.error_type().into(),
                );
                span.set_attribute(
                    "agent.error_message",
                    err.to_string().into(),
                );
                span.record_exception(&err);
                InvocationResult::internal_error()
            }
        }
    }

    async fn run(
        &self,
        payload: Option<&Value>,
        span: &dyn TelemetrySpan,
    ) -> Result<String, InvokeError> {
        let prompt = resolve_prompt(payload)?;
        span.set_attribute(
            "agent.prompt_length",
            prompt.chars().count().into(),
        );
        span.set_attribute(
            "agent.prompt",
            prompt
                .chars()
                .take(PROMPT_ATTRIBUTE_LIMIT)
                .collect::<String>()
                .into(),
        );
        info!("Received prompt: {prompt}");

        let mut agent = {
            let creation_span = span.child("agent_creation");
            let get_agent_span = creation_span.child("get_agent");
            let agent = self.factory.create_agent().inspect_err(|err| {
                get_agent_span.record_exception(err);
                creation_span.record_exception(err);
            })?;
            let tool_names = agent.tool_names();
            get_agent_span
                .set_attribute("agent.tools_count", tool_names.len().into());
            get_agent_span
                .set_attribute("agent.tools", tool_names.join(",").into());
            agent
        };

        let execution_span = span.child("agent_execution");
        execution_span.set_attribute("agent.input", prompt.as_str().into());
        let text = async {
            let response = agent.invoke(prompt).await?;
            let text = response
                .message
                .first_text()
                .ok_or(InvokeError::NoTextContent)?;
            Ok::<_, InvokeError>(text.to_owned())
        }
        .instrument(execution_span.tracing_span())
        .await
        .inspect_err(|err| execution_span.record_exception(err))?;
        execution_span
            .set_attribute("agent.output_length", text.chars().count().into());

        info!("Agent response: {text}");
        Ok(text)
    }
}
