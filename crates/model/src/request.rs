use serde_json::Value;

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelRequest {
    /// The system instructions, if any.
    pub system: Option<String>,
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// A complete message in the conversation history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelMessage {
    /// A user input text.
    User(String),
    /// A previous turn of the assistant.
    Assistant(AssistantTurn),
    /// Results of the tool calls requested by the preceding assistant turn.
    ToolResults(Vec<ToolCallResult>),
}

/// Everything the assistant produced in one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssistantTurn {
    /// The text the assistant generated, may be empty.
    pub text: String,
    /// Tool calls the assistant requested, in order.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The output of the tool call, or the reason it failed.
    pub content: String,
    /// Whether the tool call failed.
    pub is_error: bool,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
