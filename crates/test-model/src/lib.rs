//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tally_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn new(preset: PresetResponse, delay: Duration) -> Self {
        let reason = preset.resolved_finish_reason();
        let mut events: VecDeque<_> = preset
            .events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::TextBlock(text) => {
                    ModelResponseEvent::TextBlock(text)
                }
                PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(reason));
        Self {
            events,
            delay,
            sleep: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.events.is_empty() {
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct ScriptState {
    turns: VecDeque<ScriptedTurn>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should answer each request in order. Every request consumes one
/// turn; when the script runs out, an error is returned.
///
/// Clones share the same script and request log, so a provider can be
/// handed to several agents and still be inspected afterwards.
///
/// # Note
///
/// This type is not optimized for production use. You should only use it
/// for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    state: Arc<Mutex<ScriptState>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().turns.push_back(ScriptedTurn::Respond(preset));
    }

    #[inline]
    pub fn add_failure(&mut self, kind: ErrorKind) {
        self.lock().turns.push_back(ScriptedTurn::Fail(kind));
    }

    #[inline]
    pub fn add_turns(&mut self, turns: impl IntoIterator<Item = ScriptedTurn>) {
        self.lock().turns.extend(turns);
    }

    /// Sets the delay before each response event is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of turns that have not been consumed yet.
    pub fn remaining_turns(&self) -> usize {
        self.lock().turns.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn model_id(&self) -> &str {
        "test-model"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut state = self.lock();
        state.requests.push(req.clone());
        let result = match state.turns.pop_front() {
            Some(ScriptedTurn::Respond(preset)) => Ok(TestModelResponse::new(
                preset,
                self.delay.unwrap_or(Duration::from_millis(1)),
            )),
            Some(ScriptedTurn::Fail(kind)) => Err(Error {
                message: "scripted failure",
                kind,
            }),
            None => Err(Error {
                message: "no enough turns",
                kind: ErrorKind::Other,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use tally_agent_model::{
        ModelFinishReason, ModelMessage, ModelTool, ToolCallRequest,
    };

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        let mut reason = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            match event {
                ModelResponseEvent::Completed(r) => reason = Some(r),
                ModelResponseEvent::MessageDelta(delta)
                | ModelResponseEvent::TextBlock(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        (msg, tool_call, reason)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me count.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "letter_counter".to_owned(),
                arguments: json!({ "word": "hello", "letter": "l" }),
            }),
        ]));

        let mut req = ModelRequest {
            system: None,
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![ModelTool {
                name: "letter_counter".to_owned(),
                description: "Counts letters".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert!(tool_call.is_none());
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        req.messages
            .push(ModelMessage::User("How many l's in hello?".to_owned()));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Let me count.");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "letter_counter");
        assert_eq!(tool_call.arguments["letter"], "l");
        assert_eq!(reason, Some(ModelFinishReason::ToolCalls));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(provider.remaining_turns(), 0);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_exhaustion() {
        let mut provider = TestModelProvider::default();
        provider.add_failure(ErrorKind::RateLimitExceeded);

        let req = ModelRequest::default();
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("first"));
        provider.add_response(PresetResponse::text("second"));

        let other = provider.clone();
        let resp = other.send_request(&ModelRequest::default()).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "first");
        let resp =
            provider.send_request(&ModelRequest::default()).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "second");
        assert_eq!(provider.requests().len(), 2);
    }
}
