use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_agent_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ModelResponseEvent,
    ModelTool, ToolCallRequest, ToolCallResult,
};

use crate::BedrockConfig;

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inference_config: Option<InferenceConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: Vec<ContentBlock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
enum ContentBlock {
    Text(String),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlock {
    pub tool_use_id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultBlock {
    tool_use_id: String,
    content: Vec<ToolResultContent>,
    status: ToolResultStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
enum ToolResultContent {
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ToolResultStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct SystemBlock {
    text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ToolConfig {
    tools: Vec<ToolEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolEntry {
    tool_spec: ToolSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpec {
    name: String,
    description: String,
    input_schema: InputSchema,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct InputSchema {
    json: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    pub output: Output,
    pub stop_reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Output {
    pub message: Option<OutputMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OutputMessage {
    #[serde(default)]
    pub content: Vec<OutputBlock>,
}

/// A content block of the reply. Block types we don't handle (reasoning,
/// images, ...) deserialize with every field unset and are skipped.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBlock {
    pub text: Option<String>,
    pub tool_use: Option<ToolUseBlock>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "Message")]
    pub message: Option<String>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &BedrockConfig,
) -> ConverseRequest {
    ConverseRequest {
        messages: req.messages.iter().filter_map(create_message).collect(),
        system: req
            .system
            .iter()
            .map(|text| SystemBlock { text: text.clone() })
            .collect(),
        tool_config: if req.tools.is_empty() {
            None
        } else {
            Some(ToolConfig {
                tools: req.tools.iter().map(create_tool).collect(),
            })
        },
        inference_config: config
            .max_tokens
            .map(|max_tokens| InferenceConfig { max_tokens }),
    }
}

fn create_message(msg: &ModelMessage) -> Option<Message> {
    let message = match msg {
        ModelMessage::User(text) => Message {
            role: Role::User,
            content: vec![ContentBlock::Text(text.clone())],
        },
        ModelMessage::Assistant(turn) => {
            let mut content = Vec::with_capacity(turn.tool_calls.len() + 1);
            if !turn.text.is_empty() {
                content.push(ContentBlock::Text(turn.text.clone()));
            }
            content.extend(turn.tool_calls.iter().map(|call| {
                ContentBlock::ToolUse(ToolUseBlock {
                    tool_use_id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                })
            }));
            // Bedrock rejects messages without content blocks.
            if content.is_empty() {
                return None;
            }
            Message {
                role: Role::Assistant,
                content,
            }
        }
        ModelMessage::ToolResults(results) => Message {
            role: Role::User,
            content: results.iter().map(create_tool_result).collect(),
        },
    };
    Some(message)
}

#[inline]
fn create_tool_result(result: &ToolCallResult) -> ContentBlock {
    ContentBlock::ToolResult(ToolResultBlock {
        tool_use_id: result.id.clone(),
        content: vec![ToolResultContent::Text(result.content.clone())],
        status: if result.is_error {
            ToolResultStatus::Error
        } else {
            ToolResultStatus::Success
        },
    })
}

#[inline]
fn create_tool(tool: &ModelTool) -> ToolEntry {
    ToolEntry {
        tool_spec: ToolSpec {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: InputSchema {
                json: tool.parameters.clone(),
            },
        },
    }
}

/// Flattens a complete reply into the events the agent consumes.
pub fn response_events(resp: ConverseResponse) -> Vec<ModelResponseEvent> {
    let blocks = resp.output.message.map(|m| m.content).unwrap_or_default();
    let mut events = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        if let Some(text) = block.text {
            events.push(ModelResponseEvent::TextBlock(text));
        } else if let Some(tool_use) = block.tool_use {
            events.push(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: tool_use.tool_use_id,
                name: tool_use.name,
                arguments: tool_use.input,
            }));
        } else {
            trace!("skipping an unsupported content block");
        }
    }
    events.push(ModelResponseEvent::Completed(finish_reason(
        &resp.stop_reason,
    )));
    events
}

#[inline]
fn finish_reason(stop_reason: &str) -> ModelFinishReason {
    match stop_reason {
        "tool_use" => ModelFinishReason::ToolCalls,
        "max_tokens" => ModelFinishReason::MaxTokens,
        "guardrail_intervened" | "content_filtered" => {
            ModelFinishReason::ContentFiltered
        }
        _ => ModelFinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tally_agent_model::AssistantTurn;

    use super::*;
    use crate::BedrockConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            system: Some("You are a helpful AI assistant.".to_owned()),
            messages: vec![
                ModelMessage::User("How many r's in strawberry?".to_owned()),
                ModelMessage::Assistant(AssistantTurn {
                    text: String::new(),
                    tool_calls: vec![ToolCallRequest {
                        id: "tooluse_1".to_owned(),
                        name: "letter_counter".to_owned(),
                        arguments: json!({ "word": "strawberry", "letter": "r" }),
                    }],
                }),
                ModelMessage::ToolResults(vec![ToolCallResult {
                    id: "tooluse_1".to_owned(),
                    content: "3".to_owned(),
                    is_error: false,
                }]),
            ],
            tools: vec![ModelTool {
                name: "letter_counter".to_owned(),
                description: "Counts letters.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let config = BedrockConfigBuilder::with_api_key("xxx")
            .with_max_tokens(1024)
            .build();

        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "messages": [
                    {
                        "role": "user",
                        "content": [{ "text": "How many r's in strawberry?" }]
                    },
                    {
                        "role": "assistant",
                        "content": [{
                            "toolUse": {
                                "toolUseId": "tooluse_1",
                                "name": "letter_counter",
                                "input": { "word": "strawberry", "letter": "r" }
                            }
                        }]
                    },
                    {
                        "role": "user",
                        "content": [{
                            "toolResult": {
                                "toolUseId": "tooluse_1",
                                "content": [{ "text": "3" }],
                                "status": "success"
                            }
                        }]
                    }
                ],
                "system": [{ "text": "You are a helpful AI assistant." }],
                "toolConfig": {
                    "tools": [{
                        "toolSpec": {
                            "name": "letter_counter",
                            "description": "Counts letters.",
                            "inputSchema": { "json": { "type": "object" } }
                        }
                    }]
                },
                "inferenceConfig": { "maxTokens": 1024 }
            })
        );
    }

    #[test]
    fn test_minimal_request_omits_optional_sections() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::User("Hello!".to_owned()),
                ModelMessage::Assistant(AssistantTurn::default()),
            ],
            ..Default::default()
        };
        let config = BedrockConfigBuilder::with_api_key("xxx").build();

        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "messages": [{ "role": "user", "content": [{ "text": "Hello!" }] }]
            })
        );
    }

    #[test]
    fn test_response_events() {
        let resp: ConverseResponse = serde_json::from_value(json!({
            "output": {
                "message": {
                    "role": "assistant",
                    "content": [
                        { "reasoningContent": { "reasoningText": { "text": "hmm" } } },
                        { "text": "Let me count." },
                        {
                            "toolUse": {
                                "toolUseId": "tooluse_1",
                                "name": "letter_counter",
                                "input": { "word": "hello", "letter": "l" }
                            }
                        }
                    ]
                }
            },
            "stopReason": "tool_use",
            "usage": { "inputTokens": 10, "outputTokens": 5, "totalTokens": 15 },
            "metrics": { "latencyMs": 100 }
        }))
        .unwrap();

        assert_eq!(
            response_events(resp),
            vec![
                ModelResponseEvent::TextBlock("Let me count.".to_owned()),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "tooluse_1".to_owned(),
                    name: "letter_counter".to_owned(),
                    arguments: json!({ "word": "hello", "letter": "l" }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );
    }

    #[test]
    fn test_finish_reasons() {
        assert_eq!(finish_reason("end_turn"), ModelFinishReason::Stop);
        assert_eq!(finish_reason("stop_sequence"), ModelFinishReason::Stop);
        assert_eq!(finish_reason("max_tokens"), ModelFinishReason::MaxTokens);
        assert_eq!(
            finish_reason("guardrail_intervened"),
            ModelFinishReason::ContentFiltered
        );
    }
}
