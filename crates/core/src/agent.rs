mod builder;

use std::fmt::{self, Display};

use tally_agent_model::{
    AssistantTurn, ModelFinishReason, ModelMessage, ModelRequest,
    ToolCallRequest,
};

use crate::conversation::Conversation;
use crate::error::Error;
use crate::model_client::ModelClient;
use crate::tool::Manager as ToolManager;
pub use builder::AgentBuilder;

/// The number of model turns an invocation may take by default.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// An agent instance, which holds a model client, a toolset, and the
/// conversation it has had so far.
///
/// Each call to [`Agent::invoke`] runs the model until it answers without
/// requesting tools. Tool requests are executed in between, and their
/// results are fed back to the model.
pub struct Agent {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tools: ToolManager,
    conversation: Conversation,
    max_turns: usize,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            system_prompt,
            tools,
            max_turns,
        } = builder;

        Self {
            model_client,
            system_prompt,
            tools,
            conversation: Default::default(),
            max_turns,
        }
    }

    /// Returns the identifier of the model behind this agent.
    #[inline]
    pub fn model_id(&self) -> &str {
        self.model_client.model_id()
    }

    /// Returns the system prompt, if one was set.
    #[inline]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Returns the names of the registered tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names().collect()
    }

    /// Returns the conversation the agent has had so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends a user prompt and drives the model until it produces a final
    /// answer.
    pub async fn invoke<S: Into<String>>(
        &mut self,
        prompt: S,
    ) -> Result<AgentResponse, Error> {
        self.conversation.push(ModelMessage::User(prompt.into()));

        for turn in 1..=self.max_turns {
            let request = self.build_model_request();
            let resp = self
                .model_client
                .send_request(request)
                .await
                .map_err(Error::model)?;
            let tool_calls = resp.tool_calls();
            debug!(
                "turn {turn}: {} blocks, {} tool calls, finish reason {:?}",
                resp.content.len(),
                tool_calls.len(),
                resp.finish_reason
            );
            self.conversation.push(ModelMessage::Assistant(AssistantTurn {
                text: resp.text(),
                tool_calls: tool_calls.clone(),
            }));

            let wants_tools = !tool_calls.is_empty()
                && resp.finish_reason != Some(ModelFinishReason::Stop);
            if !wants_tools {
                return Ok(AgentResponse {
                    message: AssistantMessage {
                        content: resp.content,
                    },
                    stop_reason: resp
                        .finish_reason
                        .unwrap_or(ModelFinishReason::Stop),
                });
            }

            let results = self.tools.handle_requests(tool_calls).await;
            self.conversation.push(ModelMessage::ToolResults(results));
        }

        warn!("giving up after {} turns", self.max_turns);
        Err(Error::turn_limit_exceeded(self.max_turns))
    }

    fn build_model_request(&self) -> ModelRequest {
        ModelRequest {
            system: self.system_prompt.clone(),
            messages: self.conversation.messages().to_vec(),
            tools: self.tools.definitions(),
        }
    }
}

/// The final answer of an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentResponse {
    /// The assistant message that ended the invocation.
    pub message: AssistantMessage,
    /// Why the model stopped.
    pub stop_reason: ModelFinishReason,
}

impl Display for AgentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.message.content {
            if let ContentBlock::Text(text) = block {
                writeln!(f, "{text}")?;
            }
        }
        Ok(())
    }
}

/// A message from the assistant, as a list of content blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssistantMessage {
    /// Content blocks in the order the model produced them.
    pub content: Vec<ContentBlock>,
}

impl AssistantMessage {
    /// Returns the text of the first content block, or `None` when the
    /// message is empty or starts with something other than text.
    #[inline]
    pub fn first_text(&self) -> Option<&str> {
        match self.content.first() {
            Some(ContentBlock::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// A piece of an assistant message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// A tool call the model requested.
    ToolUse(ToolCallRequest),
}
