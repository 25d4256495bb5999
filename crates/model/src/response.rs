use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::ModelProviderError;

/// One model reply, delivered as a sequence of [`ModelResponseEvent`]s.
///
/// Providers that receive the whole reply at once (such as Bedrock's
/// non-streaming Converse API) simply hand out buffered events.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error produced while reading the reply.
    type Error: ModelProviderError;

    /// Polls for the next event of the reply.
    ///
    /// Returns `Poll::Ready(Ok(None))` once the reply is exhausted, and
    /// keeps returning it on later calls. A `Poll::Pending` result means
    /// the waker in `cx` is scheduled for the next event. An error ends
    /// the reply; callers must not poll again after one.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the model stopped producing output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model is waiting for tool results.
    ToolCalls,
    /// The turn ended normally.
    Stop,
    /// The output was cut off by the token limit.
    MaxTokens,
    /// The output was blocked or cut by a content filter.
    ContentFiltered,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the request with its [`ToolCallResult`].
    ///
    /// [`ToolCallResult`]: crate::ToolCallResult
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// The arguments to pass to the tool, usually a JSON object.
    pub arguments: Value,
}

/// A piece of a model reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The reply is over. Always the last event.
    Completed(ModelFinishReason),
    /// More reply text, appended to the text block being streamed.
    MessageDelta(String),
    /// A complete text block. It is never merged with neighbouring text.
    TextBlock(String),
    /// The model asks for a tool to be run.
    ToolCall(ToolCallRequest),
}
