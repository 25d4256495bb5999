use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use tally_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

use crate::agent::ContentBlock;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedReply = Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type SendFn = Arc<dyn Fn(ModelRequest) -> BoxedReply + Send + Sync>;

/// Drives a [`ModelProvider`] to completion behind a non-generic handle.
///
/// The agent never looks at individual events: each request resolves to
/// one [`ModelClientResponse`] holding the whole reply.
#[derive(Clone)]
pub struct ModelClient {
    model_id: Arc<str>,
    send_fn: SendFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model_id = Arc::from(provider.model_id());
        let send_fn: SendFn = Arc::new(move |req| {
            trace!(messages = req.messages.len(), "sending model request");
            let reply = provider.send_request(&req);
            Box::pin(
                async move {
                    match reply.await {
                        Ok(resp) => collect_reply(resp).await,
                        Err(err) => {
                            error!("model request failed: {err}");
                            Err(Box::new(err) as Box<dyn ModelProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("model request")),
            )
        });
        Self { model_id, send_fn }
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Sends a request and waits for the whole reply.
    ///
    /// Dropping the future stops reading the reply.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.send_fn)(req).await
    }
}

/// A fully received model reply.
#[derive(Clone, Debug, Default)]
pub struct ModelClientResponse {
    /// Text blocks and tool calls, in the order the model produced them.
    pub content: Vec<ContentBlock>,
    /// `None` if the reply ended without a completion event.
    pub finish_reason: Option<ModelFinishReason>,
    streaming_text: bool,
}

impl ModelClientResponse {
    fn apply(&mut self, event: ModelResponseEvent) {
        let streaming = matches!(event, ModelResponseEvent::MessageDelta(_));
        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                match self.content.last_mut() {
                    Some(ContentBlock::Text(text)) if self.streaming_text => {
                        text.push_str(&delta)
                    }
                    _ => self.content.push(ContentBlock::Text(delta)),
                }
            }
            ModelResponseEvent::TextBlock(text) => {
                self.content.push(ContentBlock::Text(text))
            }
            ModelResponseEvent::ToolCall(req) => {
                self.content.push(ContentBlock::ToolUse(req))
            }
            ModelResponseEvent::Completed(reason) => {
                self.finish_reason = Some(reason)
            }
        }
        self.streaming_text = streaming;
    }

    /// All text blocks, separated by newlines.
    pub fn text(&self) -> String {
        let blocks: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                ContentBlock::ToolUse(_) => None,
            })
            .collect();
        blocks.join("\n")
    }

    /// Tool calls requested by the model, in the order they arrived.
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(req) => Some(req.clone()),
                ContentBlock::Text(_) => None,
            })
            .collect()
    }
}

async fn collect_reply<R>(resp: R) -> SendRequestResult
where
    R: ModelResponse,
{
    let mut resp = pin!(resp);
    let mut reply = ModelClientResponse::default();
    loop {
        match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
            Ok(Some(event)) => reply.apply(event),
            Ok(None) => break,
            Err(err) => {
                error!("model reply broke off: {err}");
                return Err(Box::new(err));
            }
        }
    }
    trace!(blocks = reply.content.len(), "model reply received");
    Ok(reply)
}
